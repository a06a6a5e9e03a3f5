//! Filesystem events fed into the index
//!
//! The index does not watch the filesystem itself. Callers deliver discrete
//! [`FsEvent`]s, either built by hand, translated from a `notify` watcher with
//! [`FsEvent::from_notify`], or produced by walking a real directory with
//! [`scan_directory`].
//!
//! # Event Format
//!
//! Events serialize as tagged JSON objects:
//! ```json
//! {"type":"move","from":"/repo/top","to":"/repo/top.bak"}
//! ```
//!
//! Applying an event that is already reflected in the table (a second
//! delete, a move whose source is gone) is a no-op.

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::EventKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::table::{EntryKind, PathTable};

/// A structural filesystem change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FsEvent {
    Create { path: PathBuf, kind: EntryKind },
    Delete { path: PathBuf },
    Move { from: PathBuf, to: PathBuf },
    Rename { path: PathBuf, new_name: String },
}

impl FsEvent {
    pub fn create_dir(path: impl Into<PathBuf>) -> Self {
        Self::Create {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn create_file(path: impl Into<PathBuf>) -> Self {
        Self::Create {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::Delete { path: path.into() }
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::Move {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn renamed(path: impl Into<PathBuf>, new_name: impl Into<String>) -> Self {
        Self::Rename {
            path: path.into(),
            new_name: new_name.into(),
        }
    }

    /// Check paths against the table without changing it
    pub fn validate(&self, table: &PathTable) -> Result<()> {
        let resolver = table.resolver();
        match self {
            Self::Create { path, .. } | Self::Delete { path } => {
                resolver.segments(path)?;
            }
            Self::Move { from, to } => table.validate_move(from, to)?,
            Self::Rename { path, new_name } => {
                let target = table.rename_target(path, new_name)?;
                table.validate_move(path, &target)?;
            }
        }
        Ok(())
    }

    /// Apply to the table, returning the subtrees whose presence changed
    pub fn apply(&self, table: &mut PathTable) -> Result<Vec<PathBuf>> {
        let affected = match self {
            Self::Create { path, kind } => table.create(path, *kind)?.into_iter().collect(),
            Self::Delete { path } => {
                if table.delete_subtree(path)? {
                    vec![table.resolver().resolve(path)?]
                } else {
                    Vec::new()
                }
            }
            Self::Move { from, to } => table.move_subtree(from, to)?,
            Self::Rename { path, new_name } => table.rename(path, new_name)?,
        };
        Ok(affected)
    }

    /// Translate a watcher event into index events
    ///
    /// Renames reported as a single event become moves; renames split into
    /// separate halves become a delete of the old path and a create of the
    /// new one. Kinds the watcher leaves open are read from disk.
    pub fn from_notify(event: &notify::Event) -> Vec<FsEvent> {
        match &event.kind {
            EventKind::Create(kind) => event
                .paths
                .iter()
                .map(|path| Self::Create {
                    path: path.clone(),
                    kind: match kind {
                        CreateKind::Folder => EntryKind::Directory,
                        CreateKind::File => EntryKind::File,
                        _ => kind_on_disk(path),
                    },
                })
                .collect(),
            EventKind::Remove(_) => event
                .paths
                .iter()
                .map(|path| Self::delete(path.clone()))
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
                [from, to, ..] => vec![Self::moved(from.clone(), to.clone())],
                _ => Vec::new(),
            },
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                event.paths.iter().map(|path| Self::delete(path.clone())).collect()
            }
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .iter()
                .map(|path| {
                    if path.exists() {
                        Self::Create {
                            path: path.clone(),
                            kind: kind_on_disk(path),
                        }
                    } else {
                        Self::delete(path.clone())
                    }
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn kind_on_disk(path: &Path) -> EntryKind {
    if path.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

/// Walk a real directory and produce a `Create` event for every entry below it
pub fn scan_directory(root: &Path, config: &ScanConfig) -> Result<Vec<FsEvent>> {
    let mut builder = ignore::WalkBuilder::new(root);

    // Ignore files only when asked to
    builder.git_ignore(config.respect_gitignore);
    builder.git_global(config.respect_gitignore);
    builder.git_exclude(config.respect_gitignore);
    builder.ignore(false);
    builder.parents(false);

    // Keep dotfiles: ignored names are classified, not skipped
    builder.hidden(false);
    builder.follow_links(config.follow_links);

    let mut events = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("[SCAN] Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let kind = match entry.file_type() {
            Some(file_type) if file_type.is_dir() => EntryKind::Directory,
            _ => EntryKind::File,
        };
        events.push(FsEvent::Create {
            path: entry.into_path(),
            kind,
        });
    }

    debug!("[SCAN] {} entries under {}", events.len(), root.display());
    Ok(events)
}
