//! Classification: the precedence fold from the index root down to a path
//!
//! # Architecture
//!
//! `classify` walks the chain of table nodes from the root to the target and
//! folds each node's name and markers into a [`FoldState`]. At every node the
//! rules run in a fixed order:
//!
//! ```text
//! 1. ignored name      clears everything below until a nested root
//! 2. content root      innermost wins, resets exclusion and source state
//!                      (unloaded owner => excluded, module hidden)
//! 3. exclude root      only for the module owning this scope
//! 4. exclude pattern   names strictly below the owning content root
//! 5. compiler output   loses only to another owner's source root here
//! 6. source root       owner's root sets the source; all count for entries
//! 7. library roots     nested per kind, innermost reported
//! ```
//!
//! The fold is a pure function of the registry and the table, so the cached
//! value and a fresh recomputation must always agree.

use ahash::AHashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::info::{DirectoryInfo, ExclusionReason, OrderEntry};
use crate::registry::{LibraryRootKind, RootRegistry, SourceRootType};
use crate::table::{EntryKind, NodeId, OutputOwner, PathTable, RootMarker};

/// Classify `path` against the registry and table
pub fn classify(path: &Path, registry: &RootRegistry, table: &PathTable) -> Result<DirectoryInfo> {
    Classifier::new(registry, table).classify(path)
}

#[derive(Debug, Clone)]
struct SourceState {
    root: PathBuf,
    depth: usize,
    root_type: SourceRootType,
    prefix: String,
}

#[derive(Debug, Clone)]
struct LibraryState {
    root: PathBuf,
    depth: usize,
    /// Library indices in registration order
    libraries: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
struct FoldState {
    /// Module index owning the content scope, loaded or not
    owner: Option<usize>,
    content_root: Option<PathBuf>,
    content_entry: Option<usize>,
    content_depth: usize,
    exclusion: Option<ExclusionReason>,
    ignored: bool,
    under_ignored: bool,
    source: Option<SourceState>,
    /// Loaded modules whose source roots cover the path
    covering: Vec<usize>,
    /// Nested library roots per kind, outermost first
    classes: Vec<LibraryState>,
    sources: Vec<LibraryState>,
}

impl FoldState {
    fn clear_scope(&mut self) {
        self.owner = None;
        self.content_root = None;
        self.content_entry = None;
        self.source = None;
        self.covering.clear();
        self.classes.clear();
        self.sources.clear();
    }

    fn in_library(&self) -> bool {
        !self.classes.is_empty() || !self.sources.is_empty()
    }
}

/// Borrowed view used to classify many paths against one snapshot
pub struct Classifier<'a> {
    registry: &'a RootRegistry,
    table: &'a PathTable,
}

impl<'a> Classifier<'a> {
    pub fn new(registry: &'a RootRegistry, table: &'a PathTable) -> Self {
        Self { registry, table }
    }

    /// Classify an absolute path; absent paths are not in the project
    pub fn classify(&self, path: &Path) -> Result<DirectoryInfo> {
        match self.table.lookup_path(path)? {
            Some(id) if self.table.entry(id).is_some() => Ok(self.classify_node(id)),
            _ => Ok(DirectoryInfo::not_in_project()),
        }
    }

    /// Classify a node of the table
    pub fn classify_node(&self, id: NodeId) -> DirectoryInfo {
        let Some(entry) = self.table.entry(id) else {
            return DirectoryInfo::not_in_project();
        };

        let chain = self.table.ancestry(id);
        let mut state = FoldState::default();
        let mut path = self.table.root_path().to_path_buf();
        let mut names: Vec<&str> = Vec::with_capacity(chain.len());

        for (depth, &node) in chain.iter().enumerate() {
            if depth > 0 {
                let name = self.table.name(node);
                path.push(name);
                names.push(name);
            }
            let is_directory = self.table.entry(node) != Some(EntryKind::File);
            self.step(&mut state, node, &path, depth, is_directory);
        }

        self.finish(state, entry, &names)
    }

    // ========================================================================
    // Fold
    // ========================================================================

    fn step(&self, state: &mut FoldState, node: NodeId, path: &Path, depth: usize, is_directory: bool) {
        let markers = self.table.markers(node);
        let modules = self.registry.modules();
        state.ignored = false;

        // 1. ignored name
        if depth > 0 && self.registry.ignored_names().matches(self.table.name(node)) {
            let registered = markers.iter().any(|m| {
                matches!(m, RootMarker::ContentRoot { .. } | RootMarker::LibraryRoot { .. })
            });
            if !registered {
                state.clear_scope();
                state.ignored = true;
                state.under_ignored = true;
                state.exclusion = Some(ExclusionReason::Ignored);
                return;
            }
        }

        // 2. content root
        let content_owner = markers
            .iter()
            .filter_map(|m| match m {
                RootMarker::ContentRoot { module } => self.registry.module_index(module),
                _ => None,
            })
            .min();
        if let Some(owner) = content_owner {
            state.owner = Some(owner);
            state.content_root = Some(path.to_path_buf());
            state.content_entry = modules[owner].entry_at(path);
            state.content_depth = depth;
            state.under_ignored = false;
            state.source = None;
            state.covering.clear();
            state.exclusion = modules[owner]
                .unloaded
                .then_some(ExclusionReason::UnloadedModule);
        }

        let owner = state.owner.map(|idx| &modules[idx]);

        // 3. explicit exclude root of the owning module
        if let Some(owner) = owner {
            let excluded = markers
                .iter()
                .any(|m| matches!(m, RootMarker::ExcludeRoot { module } if *module == owner.id));
            if excluded {
                state.exclusion.get_or_insert(ExclusionReason::Explicit);
            }
        }

        // 4. exclude patterns of the owning content entry
        if let (Some(owner), Some(entry)) = (owner, state.content_entry) {
            if depth > state.content_depth
                && owner.content_entries[entry]
                    .exclude_patterns
                    .matches(self.table.name(node))
            {
                state.exclusion.get_or_insert(ExclusionReason::Pattern);
            }
        }

        // 5. compiler output
        let output_applies = markers.iter().any(|m| match m {
            RootMarker::CompilerOutput {
                owner: OutputOwner::Module { module, .. },
            } => !markers.iter().any(
                |s| matches!(s, RootMarker::SourceRoot { module: source, .. } if source != module),
            ),
            RootMarker::CompilerOutput {
                owner: OutputOwner::Project,
            } => !markers
                .iter()
                .any(|s| matches!(s, RootMarker::SourceRoot { .. })),
            _ => false,
        });
        if output_applies {
            state.exclusion.get_or_insert(ExclusionReason::CompilerOutput);
        }

        // 6. source roots
        if state.exclusion.is_none() {
            let mut source_here = false;
            for marker in markers {
                let RootMarker::SourceRoot {
                    module,
                    root_type,
                    package_prefix,
                } = marker
                else {
                    continue;
                };
                let Some(idx) = self.registry.module_index(module) else {
                    continue;
                };
                if modules[idx].unloaded {
                    continue;
                }
                if !state.covering.contains(&idx) {
                    state.covering.push(idx);
                }
                // innermost root wins
                if state.owner == Some(idx) && !source_here {
                    source_here = true;
                    state.source = Some(SourceState {
                        root: path.to_path_buf(),
                        depth,
                        root_type: *root_type,
                        prefix: package_prefix.clone(),
                    });
                }
            }
            state.covering.sort_unstable();
        }

        // 7. library roots and library exclusions
        self.step_libraries(state, markers, path, depth, is_directory);
    }

    fn step_libraries(
        &self,
        state: &mut FoldState,
        markers: &[RootMarker],
        path: &Path,
        depth: usize,
        is_directory: bool,
    ) {
        let mut classes = Vec::new();
        let mut sources = Vec::new();
        for marker in markers {
            if let RootMarker::LibraryRoot { library, kind } = marker {
                if let Some(idx) = self.registry.library_index(library) {
                    match kind {
                        LibraryRootKind::Classes => classes.push(idx),
                        LibraryRootKind::Sources => sources.push(idx),
                    }
                }
            }
        }

        if (!classes.is_empty() || !sources.is_empty()) && state.owner.is_none() {
            state.exclusion = None;
            state.under_ignored = false;
        }
        for (found, slot) in [(classes, &mut state.classes), (sources, &mut state.sources)] {
            if found.is_empty() {
                continue;
            }
            let mut libraries = found;
            libraries.sort_unstable();
            libraries.dedup();
            slot.push(LibraryState {
                root: path.to_path_buf(),
                depth,
                libraries,
            });
        }

        if !state.in_library() {
            return;
        }

        let libraries = self.registry.libraries();
        let removed: Vec<usize> = state
            .classes
            .iter()
            .chain(state.sources.iter())
            .flat_map(|s| s.libraries.iter().copied())
            .collect::<AHashSet<usize>>()
            .into_iter()
            .filter(|&idx| {
                let library = &libraries[idx];
                markers.iter().any(
                    |m| matches!(m, RootMarker::LibraryExcluded { library: id } if *id == library.id),
                ) || library.excludes(path, is_directory)
            })
            .collect();
        if removed.is_empty() {
            return;
        }

        // an outer root keeps covering the path when an inner one drops out
        for levels in [&mut state.classes, &mut state.sources] {
            for level in levels.iter_mut() {
                level.libraries.retain(|idx| !removed.contains(idx));
            }
            levels.retain(|level| !level.libraries.is_empty());
        }
        if !state.in_library() && state.owner.is_none() {
            state.exclusion.get_or_insert(ExclusionReason::Library);
        }
    }

    // ========================================================================
    // Result assembly
    // ========================================================================

    fn finish(&self, state: FoldState, entry: EntryKind, names: &[&str]) -> DirectoryInfo {
        let modules = self.registry.modules();
        let owner = state.owner.map(|idx| &modules[idx]);
        let unloaded = owner.filter(|m| m.unloaded);

        let mut info = DirectoryInfo {
            entry: Some(entry),
            exclusion: state.exclusion,
            ignored: state.ignored,
            under_ignored: state.under_ignored,
            library_class_root: state.classes.last().map(|s| s.root.clone()),
            library_source_root: state.sources.last().map(|s| s.root.clone()),
            ..Default::default()
        };

        match unloaded {
            Some(module) => info.unloaded_module_name = Some(module.id.to_string()),
            None => {
                info.module = owner.map(|m| m.id.clone());
                info.content_root = state.content_root.clone();
            }
        }

        let source = state.source.as_ref().filter(|_| state.exclusion.is_none());
        if let Some(source) = source {
            info.source_root = Some(source.root.clone());
            info.source_root_type = Some(source.root_type);
            info.package_prefix = Some(source.prefix.clone());
        }

        if entry == EntryKind::Directory && !info.is_excluded() && !info.ignored {
            info.package_name = self.package_name(&state, source, names);
        }

        if !info.is_excluded() && !info.ignored {
            info.order_entries = self.order_entries(&state);
        }

        info
    }

    /// Package name from the deepest root covering the path
    fn package_name(&self, state: &FoldState, source: Option<&SourceState>, names: &[&str]) -> Option<String> {
        let candidates = [
            source.map(|s| (s.depth, s.prefix.as_str())),
            state.classes.last().map(|s| (s.depth, "")),
            state.sources.last().map(|s| (s.depth, "")),
        ];
        let (depth, prefix) = candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, &str)>, candidate| match best {
                Some(best) if best.0 >= candidate.0 => Some(best),
                _ => Some(candidate),
            })?;

        let separator = self.registry.package_separator();
        let parts: Vec<&str> = prefix
            .split('.')
            .chain(names[depth..].iter().flat_map(|name| name.split('.')))
            .filter(|part| !part.is_empty())
            .collect();
        Some(parts.join(separator))
    }

    fn order_entries(&self, state: &FoldState) -> Vec<OrderEntry> {
        let modules = self.registry.modules();
        let libraries = self.registry.libraries();
        let mut entries = Vec::new();

        // module sources shadow a library that only sees the path as classes
        let in_module_source = state.exclusion.is_none() && !state.covering.is_empty();
        let representative = if in_module_source {
            state.sources.last()
        } else {
            state.classes.last().or(state.sources.last())
        };
        if let Some(lib_state) = representative {
            for &idx in &lib_state.libraries {
                let library = &libraries[idx];
                for viewer in self.registry.library_viewers(&library.id) {
                    entries.push(OrderEntry::Library {
                        owner: viewer.module.clone(),
                        library: library.id.clone(),
                        scope: viewer.scope,
                    });
                }
            }
        }

        if state.exclusion.is_none() {
            for &idx in &state.covering {
                let target = &modules[idx].id;
                entries.push(OrderEntry::ModuleSource {
                    owner: target.clone(),
                });
                for viewer in self.registry.module_viewers(target) {
                    entries.push(OrderEntry::ModuleDependency {
                        owner: viewer.module.clone(),
                        target: target.clone(),
                        scope: viewer.scope,
                    });
                }
            }
        }

        entries
    }
}
