//! Generation-tagged memo of classification results
//!
//! Each cached [`DirectoryInfo`] carries the generation it was computed
//! under. A lookup only hits when that generation is the current one, so a
//! batch that only bumps the generation invalidates everything lazily, while
//! a targeted batch drops the affected subtrees and re-stamps the rest.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::info::DirectoryInfo;

#[derive(Debug, Clone)]
struct CacheEntry {
    generation: u64,
    info: Arc<DirectoryInfo>,
}

/// Hit/miss counters and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe cache of `DirectoryInfo` keyed by normalized path
#[derive(Debug, Default)]
pub struct IndexCache {
    entries: RwLock<AHashMap<PathBuf, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `path` if it was computed under `generation`
    pub fn get(&self, path: &Path, generation: u64) -> Option<Arc<DirectoryInfo>> {
        let entries = self.entries.read();
        match entries.get(path) {
            Some(entry) if entry.generation == generation => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.info))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value computed under `generation`, replacing any stale one
    pub fn insert(&self, path: PathBuf, generation: u64, info: Arc<DirectoryInfo>) {
        self.entries
            .write()
            .insert(path, CacheEntry { generation, info });
    }

    /// Drop entries at or below any of `roots` and move the survivors that
    /// were current at `previous` to `next`
    ///
    /// Entries already stale before this batch stay stale.
    pub fn invalidate_subtrees(&self, roots: &[PathBuf], previous: u64, next: u64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|path, _| !roots.iter().any(|root| path.starts_with(root)));
        let dropped = before - entries.len();
        for entry in entries.values_mut() {
            if entry.generation == previous {
                entry.generation = next;
            }
        }
        dropped
    }

    /// Remove entries not computed under `generation`
    pub fn evict_stale(&self, generation: u64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.generation == generation);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
