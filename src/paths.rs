//! Path normalization and root-relative segment resolution
//!
//! Every path that enters the index (queries, root registrations, filesystem
//! events) goes through [`PathResolver`], so the rest of the crate only ever
//! sees lexically normalized absolute paths and their segments below the
//! index root.

use std::path::{Component, Path, PathBuf};

use crate::error::{IndexError, Result};

/// Lexically normalize an absolute path.
///
/// - `.` components are dropped
/// - `..` pops the previous component
/// - relative paths and `..` above the filesystem root are rejected
///
/// No filesystem access happens here; symlinks are not resolved.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use root_index::paths::normalize_path;
///
/// let path = normalize_path(Path::new("/repo/./src/../lib")).unwrap();
/// assert_eq!(path, PathBuf::from("/repo/lib"));
/// ```
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(IndexError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path must be absolute".to_string(),
        });
    }

    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(IndexError::InvalidPath {
                        path: path.to_path_buf(),
                        reason: "'..' escapes the filesystem root".to_string(),
                    });
                }
                normalized.pop();
                depth -= 1;
            }
            Component::Normal(name) => {
                normalized.push(name);
                depth += 1;
            }
        }
    }
    Ok(normalized)
}

/// Resolves absolute paths to segment lists relative to the index root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given index root
    pub fn new(root: &Path) -> Result<Self> {
        Ok(Self {
            root: normalize_path(root)?,
        })
    }

    /// The normalized index root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize `path` and check that it lies at or below the root
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let normalized = normalize_path(path)?;
        if !normalized.starts_with(&self.root) {
            return Err(IndexError::OutsideRoot {
                path: normalized,
                root: self.root.clone(),
            });
        }
        Ok(normalized)
    }

    /// Segments of `path` below the root (empty for the root itself)
    pub fn segments(&self, path: &Path) -> Result<Vec<String>> {
        let normalized = self.resolve(path)?;
        let relative = normalized
            .strip_prefix(&self.root)
            .map_err(|_| IndexError::OutsideRoot {
                path: normalized.clone(),
                root: self.root.clone(),
            })?;

        relative
            .components()
            .map(|component| {
                component
                    .as_os_str()
                    .to_str()
                    .map(str::to_string)
                    .ok_or_else(|| IndexError::InvalidPath {
                        path: normalized.clone(),
                        reason: "path segments must be valid UTF-8".to_string(),
                    })
            })
            .collect()
    }

    /// Rebuild an absolute path from root-relative segments
    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> PathBuf {
        let mut path = self.root.clone();
        for segment in segments {
            path.push(segment.as_ref());
        }
        path
    }
}

/// Validate a single path segment used as a rename target
pub fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(IndexError::InvalidPath {
            path: PathBuf::from(name),
            reason: "expected a single path segment".to_string(),
        });
    }
    Ok(())
}
