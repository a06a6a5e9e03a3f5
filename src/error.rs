//! Error types for root-index operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for index queries and mutation batches
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Path {path} is outside the indexed root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Unknown module: {id}")]
    UnknownModule { id: String },

    #[error("Module already registered: {id}")]
    DuplicateModule { id: String },

    #[error("Unknown library: {id}")]
    UnknownLibrary { id: String },

    #[error("Library already registered: {id}")]
    DuplicateLibrary { id: String },

    #[error("Module {module} has no content root at {root}")]
    UnknownContentRoot { module: String, root: PathBuf },

    #[error("Root {path} is not inside any content root of module {module}")]
    RootOutsideContent { module: String, path: PathBuf },

    #[error("Invalid name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Inconsistent index state for {path}: {message}")]
    Inconsistent { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether this error signals misuse by the caller rather than bad state
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Self::InvalidPath { .. } | Self::OutsideRoot { .. })
    }

    /// Whether this error came out of a consistency check
    pub fn is_inconsistency(&self) -> bool {
        matches!(self, Self::Inconsistent { .. })
    }
}

/// Result type alias for root-index operations
pub type Result<T> = std::result::Result<T, IndexError>;
