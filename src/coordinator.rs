//! Update coordinator: the single entry point for mutations and queries
//!
//! # Architecture
//!
//! ```text
//!  MutationBatch ──> DirectoryIndex::apply ──(write lock)──┐
//!                                                          v
//!   ┌──────────────────────────── IndexState ─────────────────────────────┐
//!   │ RootRegistry   PathTable   generation   IndexCache   PackageIndex   │
//!   └─────────────────────────────────────────────────────────────────────┘
//!                                                          ^
//!  queries ──> DirectoryIndex::read(|snapshot| ...) ──(read lock)
//! ```
//!
//! # Thread Safety
//!
//! - One `parking_lot::RwLock` guards the whole state
//! - A batch holds the write lock while it validates, applies, invalidates
//!   and bumps the generation, so readers see the state before or after it
//! - Readers fill the cache and package index through their own inner locks
//! - Do not call `apply` from inside a `read` closure or an iteration visitor
//!
//! A batch runs in four steps: every registry edit is applied to a clone of
//! the registry and every filesystem event is validated (any error rejects
//! the batch with nothing changed); the marker difference is written to the
//! path table and the events are applied; the affected subtrees are dropped
//! from the cache and package index; the generation is bumped.

use ahash::AHashSet;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, IndexCache};
use crate::classifier::Classifier;
use crate::config::IndexConfig;
use crate::consistency::ConsistencyChecker;
use crate::error::{IndexError, Result};
use crate::events::{scan_directory, FsEvent};
use crate::info::{DirectoryInfo, OrderEntry};
use crate::packages::{PackageIndex, PackageRecord};
use crate::registry::{ModuleId, Mutation, MutationBatch, RootRegistry, SourceRootType};
use crate::table::{NodeId, PathTable, RootMarker};

/// Result of applying a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Generation after the batch
    pub generation: u64,
    /// Roots of the subtrees invalidated by the batch
    pub affected: Vec<PathBuf>,
    /// Whether every cached entry was invalidated
    pub global: bool,
    /// Number of mutations in the batch
    pub applied: usize,
}

/// Diagnostic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub generation: u64,
    pub cache: CacheStats,
    pub table_nodes: usize,
    pub present_entries: usize,
    pub markers: usize,
    pub modules: usize,
    pub libraries: usize,
}

// ============================================================================
// State
// ============================================================================

struct IndexState {
    config: IndexConfig,
    registry: RootRegistry,
    table: PathTable,
    generation: u64,
    cache: IndexCache,
    packages: PackageIndex,
}

impl IndexState {
    fn apply_batch(&mut self, batch: MutationBatch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome {
                generation: self.generation,
                affected: Vec::new(),
                global: false,
                applied: 0,
            });
        }

        // Stage and validate
        let mut staged = self.registry.clone();
        for mutation in batch.iter() {
            let result = match mutation {
                Mutation::Fs(event) => event.validate(&self.table),
                other => staged.apply(other, self.table.resolver()),
            };
            if let Err(e) = result {
                warn!("[BATCH] Rejected {} in batch of {}: {}", mutation.label(), batch.len(), e);
                return Err(e);
            }
        }
        staged.rebuild_visibility();

        // Apply
        let before: AHashSet<(PathBuf, RootMarker)> = self.registry.markers().into_iter().collect();
        let after: AHashSet<(PathBuf, RootMarker)> = staged.markers().into_iter().collect();
        let mut affected = Vec::new();
        for (path, marker) in before.difference(&after) {
            self.table.remove_marker(path, marker)?;
            affected.push(path.clone());
        }
        for (path, marker) in after.difference(&before) {
            self.table.add_marker(path, marker.clone())?;
            affected.push(path.clone());
        }
        for mutation in batch.iter() {
            if let Mutation::Fs(event) = mutation {
                affected.extend(event.apply(&mut self.table)?);
            }
        }
        self.registry = staged;

        // Invalidate
        let affected = collapse_subtrees(affected);
        let global = batch.is_global();
        let previous = self.generation;
        self.generation += 1;
        if global {
            let evicted = self.cache.evict_stale(self.generation);
            self.packages.invalidate_all();
            debug!("[BATCH] Evicted {} cached entries", evicted);
        } else {
            let dropped = self
                .cache
                .invalidate_subtrees(&affected, previous, self.generation);
            self.packages.mark_dirty(&affected);
            debug!("[BATCH] Dropped {} cached entries", dropped);
        }

        debug!(
            "[BATCH] Applied {} mutations: {} affected subtrees, global={}, generation {}",
            batch.len(),
            affected.len(),
            global,
            self.generation
        );

        Ok(BatchOutcome {
            generation: self.generation,
            affected,
            global,
            applied: batch.len(),
        })
    }
}

/// Sort, dedup and drop paths nested under another path in the list
fn collapse_subtrees(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths.dedup();
    let mut roots: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for path in paths {
        if !roots.iter().any(|root| path.starts_with(root)) {
            roots.push(path);
        }
    }
    roots
}

// ============================================================================
// Snapshot queries
// ============================================================================

/// Read-only view of the index at one generation
pub struct IndexSnapshot<'a> {
    state: &'a IndexState,
}

impl<'a> IndexSnapshot<'a> {
    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn root(&self) -> &Path {
        self.state.table.root_path()
    }

    pub fn registry(&self) -> &RootRegistry {
        &self.state.registry
    }

    pub fn config(&self) -> &IndexConfig {
        &self.state.config
    }

    fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.state.registry, &self.state.table)
    }

    /// Classification of `path`, from the cache when current
    pub fn info_for_file(&self, path: &Path) -> Result<Arc<DirectoryInfo>> {
        let path = self.state.table.resolver().resolve(path)?;
        let generation = self.state.generation;
        if let Some(info) = self.state.cache.get(&path, generation) {
            return Ok(info);
        }
        let info = Arc::new(self.classifier().classify(&path)?);
        // absent paths are cheap to recompute and unbounded in number
        if info.is_present() {
            self.state.cache.insert(path, generation, Arc::clone(&info));
        }
        Ok(info)
    }

    fn info_for_node(&self, id: NodeId, path: &Path) -> Arc<DirectoryInfo> {
        let generation = self.state.generation;
        if let Some(info) = self.state.cache.get(path, generation) {
            return info;
        }
        let info = Arc::new(self.classifier().classify_node(id));
        self.state
            .cache
            .insert(path.to_path_buf(), generation, Arc::clone(&info));
        info
    }

    pub fn is_excluded(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_excluded())
    }

    pub fn is_in_content(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_in_content())
    }

    pub fn is_in_source(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_in_source())
    }

    pub fn is_in_project(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_in_project())
    }

    pub fn is_under_ignored(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.under_ignored)
    }

    pub fn is_in_library(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_in_library())
    }

    pub fn is_in_library_classes(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_in_library_classes())
    }

    pub fn is_in_library_source(&self, path: &Path) -> Result<bool> {
        Ok(self.info_for_file(path)?.is_in_library_source())
    }

    /// Owning module; with `honor_exclusion`, excluded paths have none
    pub fn module_for_file(&self, path: &Path, honor_exclusion: bool) -> Result<Option<ModuleId>> {
        let info = self.info_for_file(path)?;
        if honor_exclusion && info.exclusion.is_some() {
            return Ok(None);
        }
        Ok(info.module.clone())
    }

    /// Owning content root; with `honor_exclusion`, excluded paths have none
    pub fn content_root_for_file(&self, path: &Path, honor_exclusion: bool) -> Result<Option<PathBuf>> {
        let info = self.info_for_file(path)?;
        if honor_exclusion && info.exclusion.is_some() {
            return Ok(None);
        }
        Ok(info.content_root.clone())
    }

    pub fn source_root_for_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        Ok(self.info_for_file(path)?.source_root.clone())
    }

    pub fn source_root_type(&self, path: &Path) -> Result<Option<SourceRootType>> {
        Ok(self.info_for_file(path)?.source_root_type)
    }

    pub fn package_name(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.info_for_file(path)?.package_name.clone())
    }

    pub fn order_entries(&self, path: &Path) -> Result<Vec<OrderEntry>> {
        Ok(self.info_for_file(path)?.order_entries.clone())
    }

    /// Present children of `path`, sorted by name
    pub fn children_under(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .state
            .table
            .children_under(path)?
            .into_iter()
            .map(|(child, _)| child)
            .collect())
    }

    /// Unloaded modules in the export-respecting closure of `module`
    pub fn dependent_unloaded_modules(&self, module: &ModuleId) -> Result<BTreeSet<String>> {
        Ok(self
            .state
            .registry
            .dependent_unloaded_modules(module)?
            .into_iter()
            .map(|id| id.to_string())
            .collect())
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    /// Pre-order walk of present entries below `start`, children by name
    fn walk_from<F>(&self, start: NodeId, start_path: PathBuf, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        let table = &self.state.table;
        let mut stack = vec![(start, start_path)];
        while let Some((id, path)) = stack.pop() {
            if table.entry(id).is_none() {
                continue;
            }
            let info = self.info_for_node(id, &path);
            visit(&path, &info)?;
            let children: Vec<NodeId> = table.children(id).collect();
            for child in children.into_iter().rev() {
                let child_path = path.join(table.name(child));
                stack.push((child, child_path));
            }
        }
        ControlFlow::Continue(())
    }

    fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        let root = self.state.table.root_id();
        let _ = self.walk_from(root, self.root().to_path_buf(), &mut visit);
    }

    /// Visit every path in module content; excluded subtrees are still
    /// descended so nested content roots are found
    pub fn iterate_content<F>(&self, mut visitor: F)
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        self.walk(|path, info| {
            if info.is_in_content() {
                visitor(path, info)?;
            }
            ControlFlow::Continue(())
        });
    }

    /// Visit module content and library roots
    pub fn iterate_indexable_content<F>(&self, mut visitor: F)
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        self.walk(|path, info| {
            if info.is_indexable() {
                visitor(path, info)?;
            }
            ControlFlow::Continue(())
        });
    }

    /// Visit the content of one module
    pub fn iterate_module_content<F>(&self, module: &ModuleId, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        if self.state.registry.module(module).is_none() {
            return Err(IndexError::UnknownModule {
                id: module.to_string(),
            });
        }
        self.walk(|path, info| {
            if info.is_in_content() && info.module.as_ref() == Some(module) {
                visitor(path, info)?;
            }
            ControlFlow::Continue(())
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Packages
    // ------------------------------------------------------------------------

    fn scan_packages(&self, root: &Path) -> Vec<PackageRecord> {
        let start = match self.state.table.lookup_path(root) {
            Ok(Some(id)) => id,
            _ => return Vec::new(),
        };
        let mut records = Vec::new();
        let _ = self.walk_from(start, root.to_path_buf(), &mut |path: &Path, info: &DirectoryInfo| {
            if let Some(name) = &info.package_name {
                records.push(PackageRecord {
                    path: path.to_path_buf(),
                    name: name.clone(),
                    library_source_only: info.source_root.is_none()
                        && !info.is_in_library_classes()
                        && info.is_in_library_source(),
                });
            }
            ControlFlow::Continue(())
        });
        records
    }

    /// Directories whose package name is `name`
    pub fn directories_by_package_name(&self, name: &str, include_library_sources: bool) -> BTreeSet<PathBuf> {
        self.state
            .packages
            .directories(name, include_library_sources, |root| self.scan_packages(root))
    }

    pub fn package_count(&self) -> usize {
        self.state
            .packages
            .package_count(|root| self.scan_packages(root))
    }

    // ------------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------------

    /// Recompute `path` from scratch and compare with the cached value, then
    /// check the model invariants and the package round trip
    pub fn check_consistency(&self, path: &Path) -> Result<()> {
        let result = self.check_consistency_inner(path);
        if let Err(e) = &result {
            error!("[CONSISTENCY] {}", e);
        }
        result
    }

    fn check_consistency_inner(&self, path: &Path) -> Result<()> {
        let path = self.state.table.resolver().resolve(path)?;
        let checker = ConsistencyChecker::new();
        let cached = self.info_for_file(&path)?;
        let fresh = self.classifier().classify(&path)?;
        checker.compare(&path, &cached, &fresh)?;
        checker.check(&path, &fresh)?;
        checker.check_markers(&path, &fresh, &self.state.table)?;

        if let Some(name) = &fresh.package_name {
            if !self.directories_by_package_name(name, true).contains(&path) {
                return Err(IndexError::Inconsistent {
                    path,
                    message: format!("package '{}' does not list this directory", name),
                });
            }
        }
        Ok(())
    }

    /// Check every present path; returns how many were checked
    pub fn check_all(&self) -> Result<usize> {
        let mut paths = Vec::new();
        self.walk(|path, _| {
            paths.push(path.to_path_buf());
            ControlFlow::Continue(())
        });
        for path in &paths {
            self.check_consistency(path)?;
        }
        Ok(paths.len())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            generation: self.state.generation,
            cache: self.state.cache.stats(),
            table_nodes: self.state.table.node_count(),
            present_entries: self.state.table.present_count(),
            markers: self.state.table.marker_count(),
            modules: self.state.registry.modules().len(),
            libraries: self.state.registry.libraries().len(),
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Thread-safe handle to a directory index
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use root_index::{DirectoryIndex, FsEvent, MutationBatch, SourceRootType};
///
/// let index = DirectoryIndex::with_defaults(Path::new("/work")).unwrap();
/// index
///     .apply(
///         MutationBatch::new()
///             .with(FsEvent::create_dir("/work/m1/src/pkg1"))
///             .add_module("m1")
///             .add_content_root("m1", "/work/m1")
///             .add_source_root("m1", "/work/m1/src", SourceRootType::Source),
///     )
///     .unwrap();
///
/// let package = index.package_name(Path::new("/work/m1/src/pkg1")).unwrap();
/// assert_eq!(package.as_deref(), Some("pkg1"));
/// ```
#[derive(Clone)]
pub struct DirectoryIndex {
    state: Arc<RwLock<IndexState>>,
    root: PathBuf,
}

impl DirectoryIndex {
    /// Create an index over `root` (always present as a directory)
    pub fn new(root: &Path, config: IndexConfig) -> Result<Self> {
        let table = PathTable::new(root)?;
        let registry = RootRegistry::new(&config)?;
        let root = table.root_path().to_path_buf();
        info!("[INDEX] Created index at {}", root.display());
        Ok(Self {
            state: Arc::new(RwLock::new(IndexState {
                config,
                registry,
                packages: PackageIndex::new(&root),
                table,
                generation: 0,
                cache: IndexCache::new(),
            })),
            root,
        })
    }

    pub fn with_defaults(root: &Path) -> Result<Self> {
        Self::new(root, IndexConfig::default())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run several queries against one snapshot
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&IndexSnapshot<'_>) -> R,
    {
        let state = self.state.read();
        f(&IndexSnapshot { state: &*state })
    }

    /// Apply a batch atomically
    pub fn apply(&self, batch: MutationBatch) -> Result<BatchOutcome> {
        let mut state = self.state.write();
        state.apply_batch(batch)
    }

    /// Apply one mutation as its own batch
    pub fn apply_one(&self, mutation: impl Into<Mutation>) -> Result<BatchOutcome> {
        self.apply(MutationBatch::new().with(mutation))
    }

    /// Apply filesystem events as one batch
    pub fn apply_events<I>(&self, events: I) -> Result<BatchOutcome>
    where
        I: IntoIterator<Item = FsEvent>,
    {
        self.apply(events.into_iter().map(Mutation::Fs).collect())
    }

    /// Walk a real directory below the root and record what it contains
    pub fn refresh_from_disk(&self, path: &Path) -> Result<BatchOutcome> {
        let (path, scan) = self.read(|snapshot| {
            let path = snapshot.state.table.resolver().resolve(path)?;
            Ok::<_, IndexError>((path, snapshot.config().scan.clone()))
        })?;
        if !path.is_dir() {
            return Err(IndexError::InvalidPath {
                path,
                reason: "not a directory on disk".to_string(),
            });
        }

        let mut events = Vec::new();
        if path != self.root {
            events.push(FsEvent::create_dir(path.clone()));
        }
        events.extend(scan_directory(&path, &scan)?);
        let count = events.len();
        let outcome = self.apply_events(events)?;
        info!(
            "[SCAN] Refreshed {} ({} entries, generation {})",
            path.display(),
            count,
            outcome.generation
        );
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Single-query shortcuts
    // ------------------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.read(|s| s.generation())
    }

    pub fn info_for_file(&self, path: &Path) -> Result<Arc<DirectoryInfo>> {
        self.read(|s| s.info_for_file(path))
    }

    pub fn is_excluded(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_excluded(path))
    }

    pub fn is_in_content(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_in_content(path))
    }

    pub fn is_in_source(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_in_source(path))
    }

    pub fn is_in_project(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_in_project(path))
    }

    pub fn is_under_ignored(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_under_ignored(path))
    }

    pub fn is_in_library(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_in_library(path))
    }

    pub fn is_in_library_classes(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_in_library_classes(path))
    }

    pub fn is_in_library_source(&self, path: &Path) -> Result<bool> {
        self.read(|s| s.is_in_library_source(path))
    }

    pub fn module_for_file(&self, path: &Path, honor_exclusion: bool) -> Result<Option<ModuleId>> {
        self.read(|s| s.module_for_file(path, honor_exclusion))
    }

    pub fn content_root_for_file(&self, path: &Path, honor_exclusion: bool) -> Result<Option<PathBuf>> {
        self.read(|s| s.content_root_for_file(path, honor_exclusion))
    }

    pub fn source_root_for_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        self.read(|s| s.source_root_for_file(path))
    }

    pub fn source_root_type(&self, path: &Path) -> Result<Option<SourceRootType>> {
        self.read(|s| s.source_root_type(path))
    }

    pub fn package_name(&self, path: &Path) -> Result<Option<String>> {
        self.read(|s| s.package_name(path))
    }

    pub fn order_entries(&self, path: &Path) -> Result<Vec<OrderEntry>> {
        self.read(|s| s.order_entries(path))
    }

    pub fn children_under(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read(|s| s.children_under(path))
    }

    pub fn directories_by_package_name(&self, name: &str, include_library_sources: bool) -> BTreeSet<PathBuf> {
        self.read(|s| s.directories_by_package_name(name, include_library_sources))
    }

    pub fn dependent_unloaded_modules(&self, module: &ModuleId) -> Result<BTreeSet<String>> {
        self.read(|s| s.dependent_unloaded_modules(module))
    }

    /// Visit module content under the read lock; see [`IndexSnapshot::iterate_content`]
    pub fn iterate_content<F>(&self, visitor: F)
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        self.read(|s| s.iterate_content(visitor))
    }

    pub fn iterate_indexable_content<F>(&self, visitor: F)
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        self.read(|s| s.iterate_indexable_content(visitor))
    }

    pub fn iterate_module_content<F>(&self, module: &ModuleId, visitor: F) -> Result<()>
    where
        F: FnMut(&Path, &DirectoryInfo) -> ControlFlow<()>,
    {
        self.read(|s| s.iterate_module_content(module, visitor))
    }

    pub fn check_consistency(&self, path: &Path) -> Result<()> {
        self.read(|s| s.check_consistency(path))
    }

    pub fn check_all(&self) -> Result<usize> {
        self.read(|s| s.check_all())
    }

    pub fn stats(&self) -> IndexStats {
        self.read(|s| s.stats())
    }
}
