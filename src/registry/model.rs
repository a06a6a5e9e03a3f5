//! Declarative project model: modules, content entries and libraries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::patterns::NamePatterns;

// ============================================================================
// Identifiers
// ============================================================================

/// Module identifier (the module name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Library identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryId(String);

impl LibraryId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LibraryId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ============================================================================
// Root kinds
// ============================================================================

/// Kind of a module source root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceRootType {
    Source,
    TestSource,
    Resource,
    TestResource,
}

impl SourceRootType {
    pub fn is_test(self) -> bool {
        matches!(self, Self::TestSource | Self::TestResource)
    }

    pub fn is_resource(self) -> bool {
        matches!(self, Self::Resource | Self::TestResource)
    }
}

/// Dependency scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    #[default]
    Compile,
    Test,
    Runtime,
    Provided,
}

/// Which half of a library a root belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryRootKind {
    Classes,
    Sources,
}

// ============================================================================
// Modules
// ============================================================================

/// Target of a module dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyTarget {
    Module(ModuleId),
    Library(LibraryId),
}

/// One entry in a module's ordered dependency list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub target: DependencyTarget,
    pub exported: bool,
    pub scope: DependencyScope,
}

impl Dependency {
    /// Non-exported compile dependency on a module
    pub fn module(id: impl Into<String>) -> Self {
        Self {
            target: DependencyTarget::Module(ModuleId::new(id)),
            exported: false,
            scope: DependencyScope::Compile,
        }
    }

    /// Non-exported compile dependency on a library
    pub fn library(id: impl Into<String>) -> Self {
        Self {
            target: DependencyTarget::Library(LibraryId::new(id)),
            exported: false,
            scope: DependencyScope::Compile,
        }
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn with_scope(mut self, scope: DependencyScope) -> Self {
        self.scope = scope;
        self
    }
}

/// A typed source root inside a content entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub path: PathBuf,
    pub root_type: SourceRootType,
    /// Package prefix, `""` for none
    pub package_prefix: String,
}

/// A content root together with the roots declared inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub root: PathBuf,
    pub source_roots: Vec<SourceRoot>,
    pub exclude_roots: Vec<PathBuf>,
    pub exclude_patterns: NamePatterns,
}

impl ContentEntry {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            source_roots: Vec::new(),
            exclude_roots: Vec::new(),
            exclude_patterns: NamePatterns::empty(),
        }
    }

    /// Whether `path` is at or below this entry's root
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Per-module compiler output locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOutputPaths {
    pub production: Option<PathBuf>,
    pub tests: Option<PathBuf>,
    /// Whether the output directories are excluded from content
    pub exclude_output: bool,
}

impl Default for CompilerOutputPaths {
    fn default() -> Self {
        Self {
            production: None,
            tests: None,
            exclude_output: true,
        }
    }
}

/// A module: owner of content roots and node of the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    pub dependencies: Vec<Dependency>,
    pub unloaded: bool,
    pub content_entries: Vec<ContentEntry>,
    pub output: CompilerOutputPaths,
}

impl Module {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(id),
            dependencies: Vec::new(),
            unloaded: false,
            content_entries: Vec::new(),
            output: CompilerOutputPaths::default(),
        }
    }

    /// Innermost content entry containing `path`
    pub fn entry_containing(&self, path: &Path) -> Option<usize> {
        self.content_entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.contains(path))
            .max_by_key(|(_, entry)| entry.root.components().count())
            .map(|(idx, _)| idx)
    }

    /// Content entry rooted exactly at `root`
    pub fn entry_at(&self, root: &Path) -> Option<usize> {
        self.content_entries.iter().position(|e| e.root == root)
    }
}

// ============================================================================
// Libraries
// ============================================================================

/// Predicate over `(path, is_directory)`; `true` removes the path from the library
pub type ExclusionPredicate = Arc<dyn Fn(&Path, bool) -> bool + Send + Sync>;

/// A named set of class and source roots
#[derive(Clone)]
pub struct Library {
    pub id: LibraryId,
    pub classes: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
    /// Paths below the roots that are not part of the library
    pub excluded_roots: Vec<PathBuf>,
    pub exclusion: Option<ExclusionPredicate>,
}

impl Library {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: LibraryId::new(id),
            classes: Vec::new(),
            sources: Vec::new(),
            excluded_roots: Vec::new(),
            exclusion: None,
        }
    }

    pub fn with_classes(mut self, path: impl Into<PathBuf>) -> Self {
        self.classes.push(path.into());
        self
    }

    pub fn with_sources(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn with_excluded(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_roots.push(path.into());
        self
    }

    pub fn with_exclusion<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Path, bool) -> bool + Send + Sync + 'static,
    {
        self.exclusion = Some(Arc::new(predicate));
        self
    }

    /// Whether the exclusion predicate removes `path`
    pub fn excludes(&self, path: &Path, is_directory: bool) -> bool {
        self.exclusion
            .as_ref()
            .map(|predicate| predicate(path, is_directory))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("id", &self.id)
            .field("classes", &self.classes)
            .field("sources", &self.sources)
            .field("excluded_roots", &self.excluded_roots)
            .field("has_exclusion_predicate", &self.exclusion.is_some())
            .finish()
    }
}
