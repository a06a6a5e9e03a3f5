//! Reverse index from package name to the directories that realize it
//!
//! The index is rebuilt lazily: batches only record which subtrees became
//! dirty (or that everything did), and the next package query rescans those
//! subtrees through a caller-supplied scan function before answering.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One directory with a package name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub path: PathBuf,
    pub name: String,
    /// The only root giving this directory a package is a library source root
    pub library_source_only: bool,
}

#[derive(Debug)]
struct PackageMaps {
    root: PathBuf,
    by_name: AHashMap<String, BTreeMap<PathBuf, bool>>,
    by_path: AHashMap<PathBuf, String>,
    dirty: Vec<PathBuf>,
    full_rebuild: bool,
}

impl PackageMaps {
    fn remove_subtree(&mut self, root: &Path) {
        let stale: Vec<PathBuf> = self
            .by_path
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect();
        for path in stale {
            if let Some(name) = self.by_path.remove(&path) {
                if let Some(dirs) = self.by_name.get_mut(&name) {
                    dirs.remove(&path);
                    if dirs.is_empty() {
                        self.by_name.remove(&name);
                    }
                }
            }
        }
    }

    fn insert(&mut self, record: PackageRecord) {
        self.by_path.insert(record.path.clone(), record.name.clone());
        self.by_name
            .entry(record.name)
            .or_default()
            .insert(record.path, record.library_source_only);
    }

    fn refresh<F>(&mut self, mut scan: F)
    where
        F: FnMut(&Path) -> Vec<PackageRecord>,
    {
        if self.full_rebuild {
            self.by_name.clear();
            self.by_path.clear();
            self.dirty.clear();
            let root = self.root.clone();
            let records = scan(&root);
            debug!("[PACKAGES] Full rebuild: {} directories", records.len());
            for record in records {
                self.insert(record);
            }
            self.full_rebuild = false;
            return;
        }

        if self.dirty.is_empty() {
            return;
        }

        let mut dirty = std::mem::take(&mut self.dirty);
        dirty.sort();
        dirty.dedup();
        let mut roots: Vec<PathBuf> = Vec::new();
        for path in dirty {
            if !roots.iter().any(|root| path.starts_with(root)) {
                roots.push(path);
            }
        }

        for root in &roots {
            self.remove_subtree(root);
            for record in scan(root) {
                self.insert(record);
            }
        }
        debug!("[PACKAGES] Rescanned {} dirty subtrees", roots.len());
    }
}

/// Package name to directory reverse index
#[derive(Debug)]
pub struct PackageIndex {
    maps: Mutex<PackageMaps>,
}

impl PackageIndex {
    /// Create an index over `root` that rebuilds fully on first query
    pub fn new(root: &Path) -> Self {
        Self {
            maps: Mutex::new(PackageMaps {
                root: root.to_path_buf(),
                by_name: AHashMap::new(),
                by_path: AHashMap::new(),
                dirty: Vec::new(),
                full_rebuild: true,
            }),
        }
    }

    /// Rebuild everything on the next query
    pub fn invalidate_all(&self) {
        let mut maps = self.maps.lock();
        maps.full_rebuild = true;
        maps.dirty.clear();
    }

    /// Rescan these subtrees on the next query
    pub fn mark_dirty(&self, roots: &[PathBuf]) {
        let mut maps = self.maps.lock();
        if !maps.full_rebuild {
            maps.dirty.extend(roots.iter().cloned());
        }
    }

    /// Directories whose package name is `name`
    ///
    /// `scan` must return every package directory at or below the path it
    /// is given. With `include_library_sources == false`, directories whose
    /// only package root is a library source root are left out.
    pub fn directories<F>(&self, name: &str, include_library_sources: bool, scan: F) -> BTreeSet<PathBuf>
    where
        F: FnMut(&Path) -> Vec<PackageRecord>,
    {
        let mut maps = self.maps.lock();
        maps.refresh(scan);
        maps.by_name
            .get(name)
            .map(|dirs| {
                dirs.iter()
                    .filter(|(_, library_source_only)| {
                        include_library_sources || !**library_source_only
                    })
                    .map(|(path, _)| path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct package names, after refreshing
    pub fn package_count<F>(&self, scan: F) -> usize
    where
        F: FnMut(&Path) -> Vec<PackageRecord>,
    {
        let mut maps = self.maps.lock();
        maps.refresh(scan);
        maps.by_name.len()
    }

    /// Whether a query would trigger a rescan
    pub fn is_dirty(&self) -> bool {
        let maps = self.maps.lock();
        maps.full_rebuild || !maps.dirty.is_empty()
    }
}
