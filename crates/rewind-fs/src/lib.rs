//! File-operations providers for rewind.
//!
//! The snapshot engine never touches the filesystem directly. Every read,
//! write, listing and deletion goes through a [`FileOps`] provider, so the
//! same engine can serve different backends:
//!
//! - **Local**: the host filesystem ([`LocalFileOps`])
//! - **Memory**: an in-memory tree ([`MemoryFileOps`]), for tests and for
//!   emulating sandboxed or remote trees
//!
//! # Example
//!
//! ```rust,no_run
//! use rewind_fs::{Backend, FileOps, LocalFileOps};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fs = LocalFileOps::new();
//! let status = fs.exists(Path::new("/project/src"), Backend::Local).await?;
//! if status.is_dir {
//!     let files = fs.find_files(Path::new("/project/src"), "**/*.rs", Backend::Local).await?;
//!     println!("{} rust files", files.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;

pub use backend::Backend;
pub use error::{FsError, FsResult};
pub use local::LocalFileOps;
pub use memory::MemoryFileOps;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Existence query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathStatus {
    /// Whether the path exists.
    pub exists: bool,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

impl PathStatus {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn file() -> Self {
        Self {
            exists: true,
            is_dir: false,
        }
    }

    pub fn directory() -> Self {
        Self {
            exists: true,
            is_dir: true,
        }
    }
}

/// File metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// File size in bytes
    pub size: u64,
    /// Last modification time, if the backend reports one
    pub modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    /// Last modification time in milliseconds since the Unix epoch, or 0.
    pub fn modified_ms(&self) -> i64 {
        self.modified.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Provider of filesystem operations for one or more backends.
///
/// Every call names the backend it targets; a provider rejects backends it
/// does not serve with [`FsError::UnsupportedBackend`].
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Backends served by this provider.
    fn backends(&self) -> &[Backend];

    /// Whether this provider serves `backend`.
    fn supports(&self, backend: Backend) -> bool {
        self.backends().contains(&backend)
    }

    /// Check whether a path exists and whether it is a directory.
    ///
    /// A missing path is `Ok` with `exists == false`, not an error.
    async fn exists(&self, path: &Path, backend: Backend) -> FsResult<PathStatus>;

    /// Get file metadata.
    async fn info(&self, path: &Path, backend: Backend) -> FsResult<FileInfo>;

    /// List the direct children of a directory.
    async fn list_directory(&self, path: &Path, backend: Backend) -> FsResult<Vec<DirEntry>>;

    /// Find all files under `root` whose root-relative path matches `pattern`.
    ///
    /// Returns full paths, sorted.
    async fn find_files(
        &self,
        root: &Path,
        pattern: &str,
        backend: Backend,
    ) -> FsResult<Vec<PathBuf>>;

    /// Read a file as UTF-8 text.
    async fn read_text(&self, path: &Path, backend: Backend) -> FsResult<String> {
        let bytes = self.read_binary(path, backend).await?;
        String::from_utf8(bytes).map_err(|_| FsError::InvalidUtf8(path.display().to_string()))
    }

    /// Read a file's bytes.
    async fn read_binary(&self, path: &Path, backend: Backend) -> FsResult<Vec<u8>>;

    /// Write bytes to a file, replacing its content.
    ///
    /// The parent directory must already exist.
    async fn write_binary(&self, path: &Path, content: &[u8], backend: Backend) -> FsResult<()>;

    /// Delete a file or directory.
    ///
    /// Non-empty directories require `recursive`.
    async fn delete(&self, path: &Path, recursive: bool, backend: Backend) -> FsResult<()>;

    /// Create a directory.
    ///
    /// With `create_parents`, missing ancestors are created and an existing
    /// directory is not an error.
    async fn make_directory(&self, path: &Path, create_parents: bool, backend: Backend)
        -> FsResult<()>;
}

/// Compile a glob pattern for [`FileOps::find_files`].
pub(crate) fn compile_pattern(pattern: &str) -> FsResult<glob::Pattern> {
    glob::Pattern::new(pattern).map_err(|e| FsError::InvalidPattern(format!("{pattern}: {e}")))
}

/// Whether a root-relative path matches a compiled pattern.
pub(crate) fn pattern_matches(pattern: &glob::Pattern, relative: &Path) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    pattern.matches_path_with(relative, options)
}

/// Return an error unless `provider` serves `backend`.
pub(crate) fn check_backend<F: FileOps + ?Sized>(provider: &F, backend: Backend) -> FsResult<()> {
    if provider.supports(backend) {
        Ok(())
    } else {
        Err(FsError::UnsupportedBackend(backend))
    }
}
