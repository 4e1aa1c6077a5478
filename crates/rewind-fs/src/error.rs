//! File-operation error types.

use crate::Backend;
use std::path::Path;
use thiserror::Error;

/// Result type for file operations.
pub type FsResult<T> = Result<T, FsError>;

/// Errors that can occur during file operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// IO error from the underlying filesystem.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path does not exist.
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Expected a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// Directory is not empty and recursive removal was not requested.
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// The provider does not serve this backend.
    #[error("Backend not supported by this provider: {0}")]
    UnsupportedBackend(Backend),

    /// Backend tag could not be parsed.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Glob pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// File content is not valid UTF-8.
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(String),

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl FsError {
    /// Create a not found error for a path.
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound(path.display().to_string())
    }

    /// Create a not-a-directory error for a path.
    pub fn not_a_directory(path: &Path) -> Self {
        Self::NotADirectory(path.display().to_string())
    }

    /// Whether this error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
