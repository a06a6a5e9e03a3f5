//! Root-Index: ownership classification for project roots over a directory tree
//!
//! Given modules with content roots, typed source roots, exclusions, libraries
//! and compiler outputs, the index answers for every directory and file which
//! module owns it, whether it is source, excluded or ignored, which libraries
//! cover it, what package it realizes and which modules can see it.
//!
//! # Architecture
//!
//! ```text
//! MutationBatch ──> DirectoryIndex (coordinator)
//!                     ├── RootRegistry   modules, libraries, settings
//!                     ├── PathTable      slab tree of paths + root markers
//!                     ├── IndexCache     generation-tagged DirectoryInfo memo
//!                     └── PackageIndex   package name -> directories
//! queries ──────────> Classifier (pure fold over the path's ancestors)
//! ```
//!
//! # Example
//!
//! ```
//! use root_index::{DirectoryIndex, FsEvent, MutationBatch, SourceRootType};
//! use std::path::Path;
//!
//! let index = DirectoryIndex::with_defaults(Path::new("/project")).unwrap();
//! index
//!     .apply(
//!         MutationBatch::new()
//!             .with(FsEvent::create_dir("/project/m1/src/pkg1"))
//!             .with(FsEvent::create_dir("/project/m1/CVS"))
//!             .add_module("m1")
//!             .add_content_root("m1", "/project/m1")
//!             .add_source_root("m1", "/project/m1/src", SourceRootType::Source),
//!     )
//!     .unwrap();
//!
//! let info = index.info_for_file(Path::new("/project/m1/src/pkg1")).unwrap();
//! assert_eq!(info.package_name.as_deref(), Some("pkg1"));
//! assert!(index.is_excluded(Path::new("/project/m1/CVS")).unwrap());
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod consistency;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod info;
pub mod packages;
pub mod paths;
pub mod patterns;
pub mod registry;
pub mod table;

// Re-export commonly used types
pub use classifier::{classify, Classifier};
pub use config::{IndexConfig, ScanConfig};
pub use consistency::ConsistencyChecker;
pub use coordinator::{BatchOutcome, DirectoryIndex, IndexSnapshot, IndexStats};
pub use error::{IndexError, Result};
pub use events::{scan_directory, FsEvent};
pub use info::{DirectoryInfo, ExclusionReason, OrderEntry};
pub use registry::{
    CompilerOutputPaths, Dependency, DependencyScope, DependencyTarget, Library, LibraryId,
    LibraryRootKind, Module, ModuleId, Mutation, MutationBatch, RootRegistry, SourceRootType,
};
pub use table::{EntryKind, MarkerKind, OutputOwner, PathTable, RootMarker};
