//! Mutation batches: the only way to change the index

use std::path::PathBuf;

use crate::events::FsEvent;
use crate::registry::model::{CompilerOutputPaths, Dependency, Library, LibraryId, ModuleId, SourceRootType};

/// A single registry edit or filesystem event
#[derive(Debug, Clone)]
pub enum Mutation {
    AddModule {
        id: ModuleId,
    },
    RemoveModule {
        id: ModuleId,
    },
    AddContentRoot {
        module: ModuleId,
        root: PathBuf,
    },
    RemoveContentRoot {
        module: ModuleId,
        root: PathBuf,
    },
    /// Attach a source root to `content_root`, or to the innermost content
    /// entry of the module containing `path` when `content_root` is `None`
    AddSourceRoot {
        module: ModuleId,
        path: PathBuf,
        root_type: SourceRootType,
        package_prefix: String,
        content_root: Option<PathBuf>,
    },
    RemoveSourceRoot {
        module: ModuleId,
        path: PathBuf,
    },
    SetPackagePrefix {
        module: ModuleId,
        path: PathBuf,
        package_prefix: String,
    },
    AddExcludeRoot {
        module: ModuleId,
        path: PathBuf,
    },
    RemoveExcludeRoot {
        module: ModuleId,
        path: PathBuf,
    },
    SetExcludePatterns {
        module: ModuleId,
        content_root: PathBuf,
        patterns: Vec<String>,
    },
    AddDependency {
        module: ModuleId,
        dependency: Dependency,
    },
    SetDependencies {
        module: ModuleId,
        dependencies: Vec<Dependency>,
    },
    AddLibrary(Library),
    RemoveLibrary {
        id: LibraryId,
    },
    /// Replace the set of unloaded modules
    SetUnloadedModules {
        modules: Vec<ModuleId>,
    },
    SetModuleOutput {
        module: ModuleId,
        output: CompilerOutputPaths,
    },
    SetProjectOutput {
        path: Option<PathBuf>,
    },
    SetIgnoredNames {
        patterns: Vec<String>,
    },
    Fs(FsEvent),
}

impl Mutation {
    /// Whether applying this edit can change classification outside the
    /// subtrees of the markers it touches
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::RemoveModule { .. }
                | Self::AddDependency { .. }
                | Self::SetDependencies { .. }
                | Self::RemoveLibrary { .. }
                | Self::SetUnloadedModules { .. }
                | Self::SetIgnoredNames { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AddModule { .. } => "add-module",
            Self::RemoveModule { .. } => "remove-module",
            Self::AddContentRoot { .. } => "add-content-root",
            Self::RemoveContentRoot { .. } => "remove-content-root",
            Self::AddSourceRoot { .. } => "add-source-root",
            Self::RemoveSourceRoot { .. } => "remove-source-root",
            Self::SetPackagePrefix { .. } => "set-package-prefix",
            Self::AddExcludeRoot { .. } => "add-exclude-root",
            Self::RemoveExcludeRoot { .. } => "remove-exclude-root",
            Self::SetExcludePatterns { .. } => "set-exclude-patterns",
            Self::AddDependency { .. } => "add-dependency",
            Self::SetDependencies { .. } => "set-dependencies",
            Self::AddLibrary(_) => "add-library",
            Self::RemoveLibrary { .. } => "remove-library",
            Self::SetUnloadedModules { .. } => "set-unloaded-modules",
            Self::SetModuleOutput { .. } => "set-module-output",
            Self::SetProjectOutput { .. } => "set-project-output",
            Self::SetIgnoredNames { .. } => "set-ignored-names",
            Self::Fs(_) => "fs-event",
        }
    }
}

impl From<FsEvent> for Mutation {
    fn from(event: FsEvent) -> Self {
        Self::Fs(event)
    }
}

/// An ordered list of mutations applied atomically
#[derive(Debug, Clone, Default)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: impl Into<Mutation>) -> &mut Self {
        self.mutations.push(mutation.into());
        self
    }

    pub fn with(mut self, mutation: impl Into<Mutation>) -> Self {
        self.mutations.push(mutation.into());
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    pub fn is_global(&self) -> bool {
        self.mutations.iter().any(Mutation::is_global)
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    pub fn add_module(self, id: impl Into<String>) -> Self {
        self.with(Mutation::AddModule {
            id: ModuleId::new(id),
        })
    }

    pub fn add_content_root(self, module: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.with(Mutation::AddContentRoot {
            module: ModuleId::new(module),
            root: root.into(),
        })
    }

    pub fn add_source_root(
        self,
        module: impl Into<String>,
        path: impl Into<PathBuf>,
        root_type: SourceRootType,
    ) -> Self {
        self.with(Mutation::AddSourceRoot {
            module: ModuleId::new(module),
            path: path.into(),
            root_type,
            package_prefix: String::new(),
            content_root: None,
        })
    }

    pub fn add_exclude_root(self, module: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.with(Mutation::AddExcludeRoot {
            module: ModuleId::new(module),
            path: path.into(),
        })
    }

    pub fn add_dependency(self, module: impl Into<String>, dependency: Dependency) -> Self {
        self.with(Mutation::AddDependency {
            module: ModuleId::new(module),
            dependency,
        })
    }

    pub fn add_library(self, library: Library) -> Self {
        self.with(Mutation::AddLibrary(library))
    }
}

impl IntoIterator for MutationBatch {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl FromIterator<Mutation> for MutationBatch {
    fn from_iter<T: IntoIterator<Item = Mutation>>(iter: T) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}
