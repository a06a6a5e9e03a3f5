//! Root registry: the declarative project model
//!
//! The registry owns modules, libraries and project-level settings. It never
//! touches the path table directly: after a batch is staged, the coordinator
//! diffs [`RootRegistry::markers`] before and after and applies the
//! difference to the table.
//!
//! Every edit goes through [`RootRegistry::apply`], which validates ids and
//! paths. The coordinator applies a whole batch to a clone, so a failing
//! edit leaves the live registry untouched.

pub mod model;
pub mod mutation;

pub use model::{
    CompilerOutputPaths, ContentEntry, Dependency, DependencyScope, DependencyTarget,
    ExclusionPredicate, Library, LibraryId, LibraryRootKind, Module, ModuleId, SourceRoot,
    SourceRootType,
};
pub use mutation::{Mutation, MutationBatch};

use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::paths::PathResolver;
use crate::patterns::NamePatterns;
use crate::table::{OutputOwner, RootMarker};

/// A module that can see some target, with the scope of the edge it came through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub module: ModuleId,
    pub scope: DependencyScope,
}

/// Export-respecting dependency closure of every module
#[derive(Debug, Clone, Default)]
struct Visibility {
    /// target module -> modules that see it
    module_viewers: AHashMap<ModuleId, Vec<Viewer>>,
    /// library -> modules that see it
    library_viewers: AHashMap<LibraryId, Vec<Viewer>>,
    /// module -> modules in its closure
    reachable: AHashMap<ModuleId, Vec<ModuleId>>,
}

/// Declarative model of modules, libraries and project settings
#[derive(Debug, Clone)]
pub struct RootRegistry {
    modules: Vec<Module>,
    libraries: Vec<Library>,
    project_output: Option<PathBuf>,
    ignored_names: NamePatterns,
    package_separator: String,
    exclude_output_default: bool,
    visibility: Visibility,
}

impl RootRegistry {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            modules: Vec::new(),
            libraries: Vec::new(),
            project_output: None,
            ignored_names: config.ignored_patterns()?,
            package_separator: config.package_separator.clone(),
            exclude_output_default: config.exclude_compiler_output,
            visibility: Visibility::default(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Modules in registration order
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| &m.id == id)
    }

    pub fn module_index(&self, id: &ModuleId) -> Option<usize> {
        self.modules.iter().position(|m| &m.id == id)
    }

    /// Libraries in registration order
    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn library(&self, id: &LibraryId) -> Option<&Library> {
        self.libraries.iter().find(|l| &l.id == id)
    }

    pub fn library_index(&self, id: &LibraryId) -> Option<usize> {
        self.libraries.iter().position(|l| &l.id == id)
    }

    pub fn project_output(&self) -> Option<&Path> {
        self.project_output.as_deref()
    }

    pub fn ignored_names(&self) -> &NamePatterns {
        &self.ignored_names
    }

    pub fn package_separator(&self) -> &str {
        &self.package_separator
    }

    /// Loaded modules that see `target` through their dependency closure
    pub fn module_viewers(&self, target: &ModuleId) -> &[Viewer] {
        self.visibility
            .module_viewers
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Loaded modules that see `library` through their dependency closure
    pub fn library_viewers(&self, library: &LibraryId) -> &[Viewer] {
        self.visibility
            .library_viewers
            .get(library)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Unloaded modules reachable from `module`
    pub fn dependent_unloaded_modules(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        if self.module(module).is_none() {
            return Err(IndexError::UnknownModule {
                id: module.to_string(),
            });
        }
        Ok(self
            .visibility
            .reachable
            .get(module)
            .map(|reached| {
                reached
                    .iter()
                    .filter(|id| self.module(id).is_some_and(|m| m.unloaded))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    // ========================================================================
    // Markers
    // ========================================================================

    /// Every root marker this model implies, with its anchor path
    pub fn markers(&self) -> Vec<(PathBuf, RootMarker)> {
        let mut out = Vec::new();

        for module in &self.modules {
            for entry in &module.content_entries {
                out.push((
                    entry.root.clone(),
                    RootMarker::ContentRoot {
                        module: module.id.clone(),
                    },
                ));
                for pattern in entry.exclude_patterns.globs() {
                    out.push((
                        entry.root.clone(),
                        RootMarker::ExcludePattern {
                            module: module.id.clone(),
                            pattern: pattern.clone(),
                        },
                    ));
                }
                for source in &entry.source_roots {
                    out.push((
                        source.path.clone(),
                        RootMarker::SourceRoot {
                            module: module.id.clone(),
                            root_type: source.root_type,
                            package_prefix: source.package_prefix.clone(),
                        },
                    ));
                }
                for exclude in &entry.exclude_roots {
                    out.push((
                        exclude.clone(),
                        RootMarker::ExcludeRoot {
                            module: module.id.clone(),
                        },
                    ));
                }
            }

            if module.output.exclude_output {
                let outputs = [(&module.output.production, false), (&module.output.tests, true)];
                for (path, for_tests) in outputs {
                    if let Some(path) = path {
                        out.push((
                            path.clone(),
                            RootMarker::CompilerOutput {
                                owner: OutputOwner::Module {
                                    module: module.id.clone(),
                                    for_tests,
                                },
                            },
                        ));
                    }
                }
            }
        }

        for library in &self.libraries {
            let roots = library
                .classes
                .iter()
                .map(|p| (p, LibraryRootKind::Classes))
                .chain(library.sources.iter().map(|p| (p, LibraryRootKind::Sources)));
            for (path, kind) in roots {
                out.push((
                    path.clone(),
                    RootMarker::LibraryRoot {
                        library: library.id.clone(),
                        kind,
                    },
                ));
            }
            for path in &library.excluded_roots {
                out.push((
                    path.clone(),
                    RootMarker::LibraryExcluded {
                        library: library.id.clone(),
                    },
                ));
            }
        }

        if let Some(path) = &self.project_output {
            out.push((
                path.clone(),
                RootMarker::CompilerOutput {
                    owner: OutputOwner::Project,
                },
            ));
        }

        out
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Apply one registry edit. Filesystem events are ignored here.
    pub fn apply(&mut self, mutation: &Mutation, resolver: &PathResolver) -> Result<()> {
        match mutation {
            Mutation::AddModule { id } => {
                if self.module(id).is_some() {
                    return Err(IndexError::DuplicateModule { id: id.to_string() });
                }
                let mut module = Module::new(id.as_str());
                module.output.exclude_output = self.exclude_output_default;
                self.modules.push(module);
            }
            Mutation::RemoveModule { id } => {
                let idx = self.require_module(id)?;
                self.modules.remove(idx);
                for module in &mut self.modules {
                    module
                        .dependencies
                        .retain(|d| d.target != DependencyTarget::Module(id.clone()));
                }
            }
            Mutation::AddContentRoot { module, root } => {
                let root = resolver.resolve(root)?;
                let module = self.module_mut(module)?;
                if module.entry_at(&root).is_none() {
                    module.content_entries.push(ContentEntry::new(root));
                }
            }
            Mutation::RemoveContentRoot { module, root } => {
                let root = resolver.resolve(root)?;
                let name = module.to_string();
                let module = self.module_mut(module)?;
                let idx = module
                    .entry_at(&root)
                    .ok_or(IndexError::UnknownContentRoot { module: name, root })?;
                module.content_entries.remove(idx);
            }
            Mutation::AddSourceRoot {
                module,
                path,
                root_type,
                package_prefix,
                content_root,
            } => {
                let path = resolver.resolve(path)?;
                let content_root = content_root
                    .as_deref()
                    .map(|root| resolver.resolve(root))
                    .transpose()?;
                let name = module.to_string();
                let module = self.module_mut(module)?;
                let idx = match content_root {
                    Some(root) => module.entry_at(&root).ok_or_else(|| {
                        IndexError::UnknownContentRoot {
                            module: name.clone(),
                            root,
                        }
                    })?,
                    None => module.entry_containing(&path).ok_or_else(|| {
                        IndexError::RootOutsideContent {
                            module: name.clone(),
                            path: path.clone(),
                        }
                    })?,
                };
                let entry = &mut module.content_entries[idx];
                if !entry.contains(&path) {
                    return Err(IndexError::RootOutsideContent { module: name, path });
                }
                let source = SourceRoot {
                    path,
                    root_type: *root_type,
                    package_prefix: package_prefix.clone(),
                };
                match entry.source_roots.iter_mut().find(|s| s.path == source.path) {
                    Some(existing) => *existing = source,
                    None => entry.source_roots.push(source),
                }
            }
            Mutation::RemoveSourceRoot { module, path } => {
                let path = resolver.resolve(path)?;
                let module = self.module_mut(module)?;
                for entry in &mut module.content_entries {
                    entry.source_roots.retain(|s| s.path != path);
                }
            }
            Mutation::SetPackagePrefix {
                module,
                path,
                package_prefix,
            } => {
                let path = resolver.resolve(path)?;
                let module = self.module_mut(module)?;
                let source = module
                    .content_entries
                    .iter_mut()
                    .flat_map(|e| e.source_roots.iter_mut())
                    .find(|s| s.path == path)
                    .ok_or_else(|| IndexError::InvalidPath {
                        path: path.clone(),
                        reason: "no source root registered at this path".to_string(),
                    })?;
                source.package_prefix = package_prefix.clone();
            }
            Mutation::AddExcludeRoot { module, path } => {
                let path = resolver.resolve(path)?;
                let name = module.to_string();
                let module = self.module_mut(module)?;
                let idx = module
                    .entry_containing(&path)
                    .ok_or_else(|| IndexError::RootOutsideContent {
                        module: name,
                        path: path.clone(),
                    })?;
                let entry = &mut module.content_entries[idx];
                if !entry.exclude_roots.contains(&path) {
                    entry.exclude_roots.push(path);
                }
            }
            Mutation::RemoveExcludeRoot { module, path } => {
                let path = resolver.resolve(path)?;
                let module = self.module_mut(module)?;
                for entry in &mut module.content_entries {
                    entry.exclude_roots.retain(|p| p != &path);
                }
            }
            Mutation::SetExcludePatterns {
                module,
                content_root,
                patterns,
            } => {
                let root = resolver.resolve(content_root)?;
                let compiled = NamePatterns::new(patterns)?;
                let name = module.to_string();
                let module = self.module_mut(module)?;
                let idx = module
                    .entry_at(&root)
                    .ok_or(IndexError::UnknownContentRoot { module: name, root })?;
                module.content_entries[idx].exclude_patterns = compiled;
            }
            Mutation::AddDependency { module, dependency } => {
                self.check_target(dependency)?;
                self.module_mut(module)?.dependencies.push(dependency.clone());
            }
            Mutation::SetDependencies {
                module,
                dependencies,
            } => {
                for dependency in dependencies {
                    self.check_target(dependency)?;
                }
                self.module_mut(module)?.dependencies = dependencies.clone();
            }
            Mutation::AddLibrary(library) => {
                if self.library(&library.id).is_some() {
                    return Err(IndexError::DuplicateLibrary {
                        id: library.id.to_string(),
                    });
                }
                let mut library = library.clone();
                library.classes = resolve_all(&library.classes, resolver)?;
                library.sources = resolve_all(&library.sources, resolver)?;
                library.excluded_roots = resolve_all(&library.excluded_roots, resolver)?;
                self.libraries.push(library);
            }
            Mutation::RemoveLibrary { id } => {
                let idx = self
                    .library_index(id)
                    .ok_or_else(|| IndexError::UnknownLibrary { id: id.to_string() })?;
                self.libraries.remove(idx);
                for module in &mut self.modules {
                    module
                        .dependencies
                        .retain(|d| d.target != DependencyTarget::Library(id.clone()));
                }
            }
            Mutation::SetUnloadedModules { modules } => {
                for id in modules {
                    self.require_module(id)?;
                }
                for module in &mut self.modules {
                    module.unloaded = modules.contains(&module.id);
                }
            }
            Mutation::SetModuleOutput { module, output } => {
                let output = CompilerOutputPaths {
                    production: output
                        .production
                        .as_deref()
                        .map(|p| resolver.resolve(p))
                        .transpose()?,
                    tests: output
                        .tests
                        .as_deref()
                        .map(|p| resolver.resolve(p))
                        .transpose()?,
                    exclude_output: output.exclude_output,
                };
                self.module_mut(module)?.output = output;
            }
            Mutation::SetProjectOutput { path } => {
                self.project_output = path.as_deref().map(|p| resolver.resolve(p)).transpose()?;
            }
            Mutation::SetIgnoredNames { patterns } => {
                self.ignored_names = NamePatterns::new(patterns)?;
            }
            Mutation::Fs(_) => {}
        }
        Ok(())
    }

    fn require_module(&self, id: &ModuleId) -> Result<usize> {
        self.module_index(id)
            .ok_or_else(|| IndexError::UnknownModule { id: id.to_string() })
    }

    fn module_mut(&mut self, id: &ModuleId) -> Result<&mut Module> {
        let idx = self.require_module(id)?;
        Ok(&mut self.modules[idx])
    }

    fn check_target(&self, dependency: &Dependency) -> Result<()> {
        match &dependency.target {
            DependencyTarget::Module(id) => self.require_module(id).map(|_| ()),
            DependencyTarget::Library(id) => self
                .library_index(id)
                .map(|_| ())
                .ok_or_else(|| IndexError::UnknownLibrary { id: id.to_string() }),
        }
    }

    // ========================================================================
    // Dependency closure
    // ========================================================================

    /// Recompute the export-respecting closure of every module
    ///
    /// A module sees its direct dependencies, and through a module dependency
    /// it also sees that module's exported dependencies, transitively. The
    /// scope of the first edge is kept.
    pub fn rebuild_visibility(&mut self) {
        let mut visibility = Visibility::default();

        for viewer in &self.modules {
            let mut seen_modules: AHashSet<&ModuleId> = AHashSet::new();
            let mut seen_libraries: AHashSet<&LibraryId> = AHashSet::new();
            let mut reached = Vec::new();
            let mut queue: VecDeque<(&Dependency, DependencyScope)> = viewer
                .dependencies
                .iter()
                .map(|d| (d, d.scope))
                .collect();

            while let Some((dependency, scope)) = queue.pop_front() {
                match &dependency.target {
                    DependencyTarget::Library(id) => {
                        if seen_libraries.insert(id) && !viewer.unloaded {
                            visibility
                                .library_viewers
                                .entry(id.clone())
                                .or_default()
                                .push(Viewer {
                                    module: viewer.id.clone(),
                                    scope,
                                });
                        }
                    }
                    DependencyTarget::Module(id) => {
                        if id == &viewer.id || !seen_modules.insert(id) {
                            continue;
                        }
                        reached.push(id.clone());
                        if !viewer.unloaded {
                            visibility
                                .module_viewers
                                .entry(id.clone())
                                .or_default()
                                .push(Viewer {
                                    module: viewer.id.clone(),
                                    scope,
                                });
                        }
                        if let Some(target) = self.module(id) {
                            queue.extend(
                                target
                                    .dependencies
                                    .iter()
                                    .filter(|d| d.exported)
                                    .map(|d| (d, scope)),
                            );
                        }
                    }
                }
            }

            visibility.reachable.insert(viewer.id.clone(), reached);
        }

        self.visibility = visibility;
    }
}

fn resolve_all(paths: &[PathBuf], resolver: &PathResolver) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| resolver.resolve(p)).collect()
}
