//! Per-path classification result

use serde::Serialize;
use std::path::PathBuf;

use crate::registry::{DependencyScope, LibraryId, ModuleId, SourceRootType};
use crate::table::EntryKind;

/// Why a path is excluded from its module's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionReason {
    /// Name matched the global ignored-name list (here or above)
    Ignored,
    /// Explicit exclude root
    Explicit,
    /// Exclude name pattern of the content entry
    Pattern,
    /// Module or project compiler output
    CompilerOutput,
    /// Outside content and removed from every library
    Library,
    /// Owned by an unloaded module
    UnloadedModule,
}

/// An edge through which a module sees a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OrderEntry {
    /// `owner` depends on a library covering the path
    Library {
        owner: ModuleId,
        library: LibraryId,
        scope: DependencyScope,
    },
    /// The path is in `owner`'s own sources
    ModuleSource { owner: ModuleId },
    /// The path is in `target`'s sources and `owner` depends on `target`
    ModuleDependency {
        owner: ModuleId,
        target: ModuleId,
        scope: DependencyScope,
    },
}

impl OrderEntry {
    /// The module whose classpath this entry belongs to
    pub fn owner(&self) -> &ModuleId {
        match self {
            Self::Library { owner, .. }
            | Self::ModuleSource { owner }
            | Self::ModuleDependency { owner, .. } => owner,
        }
    }
}

/// Classification of one path
///
/// `exclusion` records module-level exclusion. A path excluded from its module
/// can still be project content through a library root; [`is_excluded`]
/// answers the project-level question.
///
/// [`is_excluded`]: DirectoryInfo::is_excluded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryInfo {
    /// Present entry kind, `None` when the path is not in the filesystem model
    #[serde(skip)]
    pub entry: Option<EntryKind>,
    pub module: Option<ModuleId>,
    pub content_root: Option<PathBuf>,
    pub source_root: Option<PathBuf>,
    pub source_root_type: Option<SourceRootType>,
    pub package_prefix: Option<String>,
    pub library_class_root: Option<PathBuf>,
    pub library_source_root: Option<PathBuf>,
    pub exclusion: Option<ExclusionReason>,
    /// This path's own name is ignored
    pub ignored: bool,
    /// This path or an ancestor is ignored
    pub under_ignored: bool,
    pub unloaded_module_name: Option<String>,
    pub package_name: Option<String>,
    pub order_entries: Vec<OrderEntry>,
}

impl DirectoryInfo {
    /// Result for a path that is absent or outside every root
    pub fn not_in_project() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.entry.is_some()
    }

    pub fn is_directory(&self) -> bool {
        self.entry == Some(EntryKind::Directory)
    }

    pub fn is_in_library_classes(&self) -> bool {
        self.library_class_root.is_some()
    }

    pub fn has_library_class_root(&self) -> bool {
        self.library_class_root.is_some()
    }

    pub fn is_in_library_source(&self) -> bool {
        self.library_source_root.is_some()
    }

    pub fn is_in_library(&self) -> bool {
        self.is_in_library_classes() || self.is_in_library_source()
    }

    /// Excluded from its module (or the project) and not rescued by a library
    pub fn is_excluded(&self) -> bool {
        self.exclusion.is_some() && !self.is_in_library()
    }

    /// Excluded from module content, regardless of libraries
    pub fn is_excluded_from_module(&self) -> bool {
        self.exclusion.is_some()
    }

    /// Owned by a loaded module and not excluded from it
    pub fn is_in_content(&self) -> bool {
        self.module.is_some() && self.exclusion.is_none()
    }

    /// Inside a module source root
    pub fn is_in_source(&self) -> bool {
        self.source_root.is_some()
    }

    pub fn is_in_project(&self) -> bool {
        self.is_in_content() || (self.is_in_library() && !self.is_excluded())
    }

    /// Module content or library roots, the set that gets indexed
    pub fn is_indexable(&self) -> bool {
        self.is_in_project()
    }

    /// Distinct owners of the order entries, in entry order
    pub fn order_entry_modules(&self) -> Vec<ModuleId> {
        let mut owners: Vec<ModuleId> = Vec::new();
        for entry in &self.order_entries {
            if !owners.contains(entry.owner()) {
                owners.push(entry.owner().clone());
            }
        }
        owners
    }
}
