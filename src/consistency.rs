//! Invariant checks over classification results
//!
//! Used by `check_consistency` and by tests. Every check reports all the
//! violations it finds for a path in one `IndexError::Inconsistent`.

use std::path::Path;

use crate::error::{IndexError, Result};
use crate::info::{DirectoryInfo, ExclusionReason};
use crate::registry::LibraryRootKind;
use crate::table::{MarkerKind, PathTable, RootMarker};

/// Asserts the model invariants for a single `DirectoryInfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsistencyChecker;

impl ConsistencyChecker {
    pub fn new() -> Self {
        Self
    }

    /// List every invariant `info` breaks
    pub fn violations(&self, path: &Path, info: &DirectoryInfo) -> Vec<String> {
        let mut out = Vec::new();

        if !info.is_present() {
            if *info != DirectoryInfo::not_in_project() {
                out.push("absent path carries a classification".to_string());
            }
            return out;
        }

        if info.ignored {
            if info.module.is_some() {
                out.push("ignored path has a module".to_string());
            }
            if !info.is_excluded() {
                out.push("ignored path is not excluded".to_string());
            }
            if !info.under_ignored {
                out.push("ignored path is not under an ignored directory".to_string());
            }
        }
        if info.under_ignored && info.exclusion != Some(ExclusionReason::Ignored) {
            out.push("path under an ignored directory is not excluded as ignored".to_string());
        }

        if let Some(name) = &info.unloaded_module_name {
            if info.module.is_some() {
                out.push(format!("path of unloaded module {} reports a module", name));
            }
            if info.exclusion != Some(ExclusionReason::UnloadedModule) {
                out.push(format!("path of unloaded module {} is not excluded", name));
            }
        }

        match (&info.module, &info.content_root) {
            (Some(_), None) => out.push("module without a content root".to_string()),
            (None, Some(_)) => out.push("content root without a module".to_string()),
            (Some(_), Some(root)) if !path.starts_with(root) => {
                out.push(format!("content root {} does not contain the path", root.display()))
            }
            _ => {}
        }

        if let Some(source) = &info.source_root {
            if !path.starts_with(source) {
                out.push(format!("source root {} does not contain the path", source.display()));
            }
            if info.exclusion.is_some() {
                out.push("excluded path reports a source root".to_string());
            }
            match &info.content_root {
                Some(root) if source.starts_with(root) => {}
                _ => out.push("source root outside the content root".to_string()),
            }
            if info.source_root_type.is_none() {
                out.push("source root without a type".to_string());
            }
        }

        for root in [&info.library_class_root, &info.library_source_root]
            .into_iter()
            .flatten()
        {
            if !path.starts_with(root) {
                out.push(format!("library root {} does not contain the path", root.display()));
            }
        }

        if info.package_name.is_some() {
            if !info.is_directory() {
                out.push("file has a package name".to_string());
            }
            if info.is_excluded() || info.ignored {
                out.push("excluded path has a package name".to_string());
            }
            if info.source_root.is_none() && !info.is_in_library() {
                out.push("package name without a covering root".to_string());
            }
        }

        if info.is_excluded() && !info.order_entries.is_empty() {
            out.push("excluded path has order entries".to_string());
        }

        out
    }

    /// Re-derive the ownership fields of `info` from the markers in `table`
    ///
    /// Walks ancestor markers directly instead of running the fold, so a
    /// fold that picks the wrong root shows up here.
    pub fn marker_violations(
        &self,
        path: &Path,
        info: &DirectoryInfo,
        table: &PathTable,
    ) -> Result<Vec<String>> {
        let mut out = Vec::new();
        if !info.is_present() {
            return Ok(out);
        }

        let nearest_content = table.nearest_marker_of_kind(path, MarkerKind::ContentRoot)?;
        if let Some(root) = &info.content_root {
            match &nearest_content {
                Some((nearest, _)) if nearest == root => {}
                Some((nearest, _)) => out.push(format!(
                    "content root {} is not the innermost one, {} is",
                    root.display(),
                    nearest.display()
                )),
                None => out.push(format!("no content root marker at {}", root.display())),
            }
            let registered = table.markers_at(root)?.iter().any(|m| {
                matches!(m, RootMarker::ContentRoot { module } if Some(module) == info.module.as_ref())
            });
            if !registered {
                out.push(format!("module is not registered at {}", root.display()));
            }
        }
        if let Some(name) = &info.unloaded_module_name {
            let registered = match &nearest_content {
                Some((root, _)) => table.markers_at(root)?.iter().any(
                    |m| matches!(m, RootMarker::ContentRoot { module } if module.as_str() == name),
                ),
                None => false,
            };
            if !registered {
                out.push(format!("unloaded module {} has no covering content root", name));
            }
        }

        let required = match info.exclusion {
            Some(ExclusionReason::Explicit) => Some(MarkerKind::ExcludeRoot),
            Some(ExclusionReason::Pattern) => Some(MarkerKind::ExcludePattern),
            Some(ExclusionReason::CompilerOutput) => Some(MarkerKind::CompilerOutput),
            _ => None,
        };
        if let Some(kind) = required {
            if table.nearest_marker_of_kind(path, kind)?.is_none() {
                out.push(format!("excluded as {:?} without a {:?} marker above", info.exclusion, kind));
            }
        }

        if let Some(source) = &info.source_root {
            let registered = table.markers_at(source)?.iter().any(|m| {
                matches!(m, RootMarker::SourceRoot { module, root_type, .. }
                    if Some(module) == info.module.as_ref() && Some(*root_type) == info.source_root_type)
            });
            if !registered {
                out.push(format!("no matching source root marker at {}", source.display()));
            }
        }

        for (root, wanted) in [
            (&info.library_class_root, LibraryRootKind::Classes),
            (&info.library_source_root, LibraryRootKind::Sources),
        ] {
            let Some(root) = root else {
                continue;
            };
            let registered = table
                .markers_at(root)?
                .iter()
                .any(|m| matches!(m, RootMarker::LibraryRoot { kind, .. } if *kind == wanted));
            if !registered {
                out.push(format!("no {:?} library root marker at {}", wanted, root.display()));
            }
        }

        Ok(out)
    }

    /// Fail if `info` breaks any invariant
    pub fn check(&self, path: &Path, info: &DirectoryInfo) -> Result<()> {
        Self::fail_on(path, self.violations(path, info))
    }

    /// Fail if `info` disagrees with the markers in `table`
    pub fn check_markers(&self, path: &Path, info: &DirectoryInfo, table: &PathTable) -> Result<()> {
        Self::fail_on(path, self.marker_violations(path, info, table)?)
    }

    fn fail_on(path: &Path, violations: Vec<String>) -> Result<()> {
        if violations.is_empty() {
            return Ok(());
        }
        Err(IndexError::Inconsistent {
            path: path.to_path_buf(),
            message: violations.join("; "),
        })
    }

    /// Fail if a cached value differs from a fresh recomputation
    pub fn compare(&self, path: &Path, cached: &DirectoryInfo, fresh: &DirectoryInfo) -> Result<()> {
        if cached == fresh {
            return Ok(());
        }
        Err(IndexError::Inconsistent {
            path: path.to_path_buf(),
            message: format!("cached {:?} differs from recomputed {:?}", cached, fresh),
        })
    }
}
