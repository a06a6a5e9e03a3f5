//! Path table: the arena-backed tree of known paths and root markers
//!
//! # Architecture
//!
//! ```text
//! PathTable
//! ├── resolver   absolute path <-> segments below the index root
//! └── nodes      Slab<Node>, one node per path segment
//!       Node { name, parent, children: name -> key, markers, entry }
//! ```
//!
//! A node exists when it is present in the filesystem model (`entry` is set),
//! carries at least one [`RootMarker`], or has children. Markers are anchored
//! to the path they were registered at: deleting or moving the filesystem
//! entry leaves them in place, so recreating the path restores its roots.
//!
//! Nodes are addressed by [`NodeId`] (a slab key). Deleting a subtree frees
//! the keys of nodes that no longer carry anything, and the slab reuses them.

use serde::{Deserialize, Serialize};
use slab::Slab;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::paths::{validate_segment, PathResolver};
use crate::registry::{LibraryId, LibraryRootKind, ModuleId, SourceRootType};

// ============================================================================
// Markers
// ============================================================================

/// Owner of a compiler output root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputOwner {
    Module { module: ModuleId, for_tests: bool },
    Project,
}

/// A root registration attached to a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RootMarker {
    ContentRoot {
        module: ModuleId,
    },
    SourceRoot {
        module: ModuleId,
        root_type: SourceRootType,
        package_prefix: String,
    },
    ExcludeRoot {
        module: ModuleId,
    },
    /// One name glob of a content entry, anchored at the content root
    ExcludePattern {
        module: ModuleId,
        pattern: String,
    },
    LibraryRoot {
        library: LibraryId,
        kind: LibraryRootKind,
    },
    LibraryExcluded {
        library: LibraryId,
    },
    CompilerOutput {
        owner: OutputOwner,
    },
}

/// Marker discriminant used by ancestor lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    ContentRoot,
    SourceRoot,
    ExcludeRoot,
    ExcludePattern,
    LibraryRoot,
    LibraryExcluded,
    CompilerOutput,
}

impl RootMarker {
    pub fn kind(&self) -> MarkerKind {
        match self {
            Self::ContentRoot { .. } => MarkerKind::ContentRoot,
            Self::SourceRoot { .. } => MarkerKind::SourceRoot,
            Self::ExcludeRoot { .. } => MarkerKind::ExcludeRoot,
            Self::ExcludePattern { .. } => MarkerKind::ExcludePattern,
            Self::LibraryRoot { .. } => MarkerKind::LibraryRoot,
            Self::LibraryExcluded { .. } => MarkerKind::LibraryExcluded,
            Self::CompilerOutput { .. } => MarkerKind::CompilerOutput,
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Kind of a present filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_directory(self) -> bool {
        self == Self::Directory
    }
}

/// Slab key of a table node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<usize>,
    children: BTreeMap<String, usize>,
    markers: Vec<RootMarker>,
    entry: Option<EntryKind>,
}

impl Node {
    fn new(name: String, parent: Option<usize>) -> Self {
        Self {
            name,
            parent,
            children: BTreeMap::new(),
            markers: Vec::new(),
            entry: None,
        }
    }

    fn is_vacant(&self) -> bool {
        self.entry.is_none() && self.markers.is_empty() && self.children.is_empty()
    }
}

/// Tree of known paths below the index root
#[derive(Debug, Clone)]
pub struct PathTable {
    resolver: PathResolver,
    nodes: Slab<Node>,
    root: usize,
}

impl PathTable {
    /// Create a table whose only entry is the (present) root directory
    pub fn new(root: &Path) -> Result<Self> {
        let resolver = PathResolver::new(root)?;
        let mut nodes = Slab::new();
        let mut root_node = Node::new(String::new(), None);
        root_node.entry = Some(EntryKind::Directory);
        let root = nodes.insert(root_node);
        Ok(Self {
            resolver,
            nodes,
            root,
        })
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn root_path(&self) -> &Path {
        self.resolver.root()
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(self.root)
    }

    // ------------------------------------------------------------------------
    // Node access
    // ------------------------------------------------------------------------

    /// Node for `segments`, if one exists
    pub fn lookup(&self, segments: &[String]) -> Option<NodeId> {
        let mut current = self.root;
        for segment in segments {
            current = *self.nodes[current].children.get(segment)?;
        }
        Some(NodeId(current))
    }

    /// Node for an absolute path, if one exists
    pub fn lookup_path(&self, path: &Path) -> Result<Option<NodeId>> {
        let segments = self.resolver.segments(path)?;
        Ok(self.lookup(&segments))
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn markers(&self, id: NodeId) -> &[RootMarker] {
        &self.nodes[id.0].markers
    }

    pub fn entry(&self, id: NodeId) -> Option<EntryKind> {
        self.nodes[id.0].entry
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent.map(NodeId)
    }

    /// Children of a node in name order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0].children.values().map(|&key| NodeId(key))
    }

    /// Chain of nodes from the root down to `id` (inclusive)
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id.0);
        while let Some(key) = current {
            chain.push(NodeId(key));
            current = self.nodes[key].parent;
        }
        chain.reverse();
        chain
    }

    /// Absolute path of a node
    pub fn path_of(&self, id: NodeId) -> PathBuf {
        let chain = self.ancestry(id);
        let names: Vec<&str> = chain[1..].iter().map(|&n| self.name(n)).collect();
        self.resolver.join(&names)
    }

    fn ensure_node(&mut self, segments: &[String]) -> usize {
        let mut current = self.root;
        for segment in segments {
            current = self.child_or_insert(current, segment);
        }
        current
    }

    /// Return vacant nodes to the arena, walking up from `key`
    fn prune_from(&mut self, key: usize) {
        let mut current = key;
        while current != self.root && self.nodes[current].is_vacant() {
            let node = self.nodes.remove(current);
            let Some(parent) = node.parent else { break };
            self.nodes[parent].children.remove(&node.name);
            current = parent;
        }
    }

    // ------------------------------------------------------------------------
    // Markers
    // ------------------------------------------------------------------------

    /// Attach a marker; returns `false` if it was already present
    pub fn add_marker(&mut self, path: &Path, marker: RootMarker) -> Result<bool> {
        let segments = self.resolver.segments(path)?;
        let key = self.ensure_node(&segments);
        let markers = &mut self.nodes[key].markers;
        if markers.contains(&marker) {
            return Ok(false);
        }
        markers.push(marker);
        Ok(true)
    }

    /// Detach a marker; returns `false` if it was not present
    pub fn remove_marker(&mut self, path: &Path, marker: &RootMarker) -> Result<bool> {
        let segments = self.resolver.segments(path)?;
        let Some(NodeId(key)) = self.lookup(&segments) else {
            return Ok(false);
        };
        let markers = &mut self.nodes[key].markers;
        let Some(pos) = markers.iter().position(|m| m == marker) else {
            return Ok(false);
        };
        markers.remove(pos);
        self.prune_from(key);
        Ok(true)
    }

    /// Markers registered exactly at `path`
    pub fn markers_at(&self, path: &Path) -> Result<Vec<RootMarker>> {
        Ok(self
            .lookup_path(path)?
            .map(|id| self.markers(id).to_vec())
            .unwrap_or_default())
    }

    /// Innermost marker of `kind` at or above `path`
    pub fn nearest_marker_of_kind(
        &self,
        path: &Path,
        kind: MarkerKind,
    ) -> Result<Option<(PathBuf, RootMarker)>> {
        let segments = self.resolver.segments(path)?;

        // Deepest existing node on the way down
        let mut current = self.root;
        for segment in &segments {
            match self.nodes[current].children.get(segment) {
                Some(&child) => current = child,
                None => break,
            }
        }

        let mut cursor = Some(current);
        while let Some(key) = cursor {
            if let Some(marker) = self.nodes[key].markers.iter().find(|m| m.kind() == kind) {
                return Ok(Some((self.path_of(NodeId(key)), marker.clone())));
            }
            cursor = self.nodes[key].parent;
        }
        Ok(None)
    }

    pub fn marker_count(&self) -> usize {
        self.nodes.iter().map(|(_, node)| node.markers.len()).sum()
    }

    // ------------------------------------------------------------------------
    // Filesystem model
    // ------------------------------------------------------------------------

    /// Kind of the present entry at `path`
    pub fn entry_kind(&self, path: &Path) -> Result<Option<EntryKind>> {
        Ok(self.lookup_path(path)?.and_then(|id| self.entry(id)))
    }

    pub fn is_present(&self, path: &Path) -> Result<bool> {
        Ok(self.entry_kind(path)?.is_some())
    }

    /// Record a created entry, creating missing ancestors as directories
    ///
    /// Returns the topmost path whose presence changed, or `None` if the
    /// entry already existed with the same kind.
    pub fn create(&mut self, path: &Path, kind: EntryKind) -> Result<Option<PathBuf>> {
        let segments = self.resolver.segments(path)?;
        Ok(self.create_segments(&segments, kind))
    }

    fn create_segments(&mut self, segments: &[String], kind: EntryKind) -> Option<PathBuf> {
        if segments.is_empty() {
            return None;
        }

        let mut changed: Option<usize> = None;
        let mut current = self.root;
        let last = segments.len() - 1;
        for (depth, segment) in segments.iter().enumerate() {
            current = self.child_or_insert(current, segment);

            let wanted = if depth == last {
                kind
            } else {
                EntryKind::Directory
            };
            if self.nodes[current].entry != Some(wanted) {
                if self.nodes[current].entry == Some(EntryKind::Directory)
                    && wanted == EntryKind::File
                {
                    self.clear_descendants(current);
                }
                self.nodes[current].entry = Some(wanted);
                if changed.is_none() {
                    changed = Some(current);
                }
            }
        }

        changed.map(|key| self.path_of(NodeId(key)))
    }

    fn child_or_insert(&mut self, parent: usize, name: &str) -> usize {
        if let Some(&child) = self.nodes[parent].children.get(name) {
            return child;
        }
        let child = self.nodes.insert(Node::new(name.to_string(), Some(parent)));
        self.nodes[parent].children.insert(name.to_string(), child);
        child
    }

    /// Clear presence below `key`, pruning vacant nodes
    fn clear_descendants(&mut self, key: usize) {
        let children: Vec<usize> = self.nodes[key].children.values().copied().collect();
        for child in children {
            self.clear_subtree(child);
        }
    }

    fn clear_subtree(&mut self, key: usize) {
        let children: Vec<usize> = self.nodes[key].children.values().copied().collect();
        for child in children {
            self.clear_subtree(child);
        }
        self.nodes[key].entry = None;
        if self.nodes[key].is_vacant() {
            let node = self.nodes.remove(key);
            if let Some(parent) = node.parent {
                self.nodes[parent].children.remove(&node.name);
            }
        }
    }

    /// Remove `path` and everything below it from the filesystem model
    ///
    /// Returns `false` if nothing was present. Deleting the index root clears
    /// its contents but the root itself stays present.
    pub fn delete_subtree(&mut self, path: &Path) -> Result<bool> {
        let segments = self.resolver.segments(path)?;
        Ok(self.delete_segments(&segments))
    }

    fn delete_segments(&mut self, segments: &[String]) -> bool {
        let Some(NodeId(key)) = self.lookup(segments) else {
            return false;
        };
        if key == self.root {
            let had_children = self.has_present_descendant(key);
            self.clear_descendants(key);
            return had_children;
        }
        if self.nodes[key].entry.is_none() && !self.has_present_descendant(key) {
            return false;
        }
        let parent = self.nodes[key].parent;
        self.clear_subtree(key);
        if let Some(parent) = parent {
            self.prune_from(parent);
        }
        true
    }

    fn has_present_descendant(&self, key: usize) -> bool {
        self.nodes[key]
            .children
            .values()
            .any(|&child| self.nodes[child].entry.is_some() || self.has_present_descendant(child))
    }

    /// Present entries of a subtree as (relative segments, kind), parents first
    fn present_entries(&self, key: usize) -> Vec<(Vec<String>, EntryKind)> {
        let mut out = Vec::new();
        let mut stack = vec![(key, Vec::<String>::new())];
        while let Some((current, relative)) = stack.pop() {
            if let Some(kind) = self.nodes[current].entry {
                out.push((relative.clone(), kind));
            }
            for (name, &child) in self.nodes[current].children.iter().rev() {
                let mut child_relative = relative.clone();
                child_relative.push(name.clone());
                stack.push((child, child_relative));
            }
        }
        out
    }

    /// Check a move before applying it
    pub fn validate_move(&self, from: &Path, to: &Path) -> Result<()> {
        let from_segments = self.resolver.segments(from)?;
        let to_segments = self.resolver.segments(to)?;
        if from_segments.is_empty() || to_segments.is_empty() {
            return Err(IndexError::InvalidPath {
                path: from.to_path_buf(),
                reason: "cannot move the index root".to_string(),
            });
        }
        if to_segments.len() > from_segments.len() && to_segments.starts_with(&from_segments) {
            return Err(IndexError::InvalidPath {
                path: to.to_path_buf(),
                reason: "cannot move a directory into itself".to_string(),
            });
        }
        Ok(())
    }

    /// Move the present entries below `from` to `to`
    ///
    /// Markers stay at their registered paths. A missing source is a no-op
    /// and an existing target is replaced. Returns the topmost paths whose
    /// presence changed: the source, and the target or its highest ancestor
    /// created along the way. Empty when nothing moved.
    pub fn move_subtree(&mut self, from: &Path, to: &Path) -> Result<Vec<PathBuf>> {
        self.validate_move(from, to)?;
        let from_segments = self.resolver.segments(from)?;
        let to_segments = self.resolver.segments(to)?;
        if from_segments == to_segments {
            return Ok(Vec::new());
        }

        let entries = match self.lookup(&from_segments) {
            Some(NodeId(key)) if self.nodes[key].entry.is_some() => self.present_entries(key),
            _ => return Ok(Vec::new()),
        };

        let mut changed = vec![self.resolver.resolve(from)?, self.resolver.resolve(to)?];
        self.delete_segments(&from_segments);
        self.delete_segments(&to_segments);
        for (relative, kind) in entries {
            let mut target = to_segments.clone();
            target.extend(relative);
            if let Some(created) = self.create_segments(&target, kind) {
                if !changed.iter().any(|path| created.starts_with(path)) {
                    changed.push(created);
                }
            }
        }
        Ok(changed)
    }

    /// Rename the entry at `path` within its parent directory
    pub fn rename(&mut self, path: &Path, new_name: &str) -> Result<Vec<PathBuf>> {
        let target = self.rename_target(path, new_name)?;
        self.move_subtree(path, &target)
    }

    /// Destination path of a rename
    pub fn rename_target(&self, path: &Path, new_name: &str) -> Result<PathBuf> {
        validate_segment(new_name)?;
        let resolved = self.resolver.resolve(path)?;
        let parent = resolved
            .parent()
            .filter(|p| p.starts_with(self.resolver.root()))
            .ok_or_else(|| IndexError::InvalidPath {
                path: resolved.clone(),
                reason: "cannot rename the index root".to_string(),
            })?;
        Ok(parent.join(new_name))
    }

    /// Present children of `path`, sorted by name
    pub fn children_under(&self, path: &Path) -> Result<Vec<(PathBuf, EntryKind)>> {
        let Some(id) = self.lookup_path(path)? else {
            return Ok(Vec::new());
        };
        if self.entry(id).is_none() {
            return Ok(Vec::new());
        }
        let base = self.resolver.resolve(path)?;
        Ok(self
            .children(id)
            .filter_map(|child| {
                self.entry(child)
                    .map(|kind| (base.join(self.name(child)), kind))
            })
            .collect())
    }

    /// Number of allocated nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of present filesystem entries, including the root
    pub fn present_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|(_, node)| node.entry.is_some())
            .count()
    }
}
