//! Content-addressed object storage.
//!
//! Objects are stored once per distinct content, named by the SHA-256 of
//! their bytes:
//! ```text
//! objects/
//!   ab/
//!     ab12...ef      # sharded layout (written)
//!   cd34...01        # legacy flat layout (read only)
//! ```

use crate::SnapshotResult;
use rewind_fs::{Backend, FileOps};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Hex-encoded SHA-256 of `content`.
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Whether `hash` looks like a SHA-256 hex digest.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// On-disk layouts an object may be stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLayout {
    /// `objects/<first two hex chars>/<hash>`
    Sharded,
    /// `objects/<hash>`
    Flat,
}

impl ObjectLayout {
    /// Layouts tried by lookups, in order.
    pub const LOOKUP_ORDER: [ObjectLayout; 2] = [ObjectLayout::Sharded, ObjectLayout::Flat];

    /// Path of `hash` under this layout.
    pub fn path(&self, objects_dir: &Path, hash: &str) -> PathBuf {
        match self {
            ObjectLayout::Sharded => objects_dir.join(&hash[..2]).join(hash),
            ObjectLayout::Flat => objects_dir.join(hash),
        }
    }
}

/// Deduplicating blob store.
#[derive(Clone)]
pub struct ObjectStore {
    fs: Arc<dyn FileOps>,
    backend: Backend,
    objects_dir: PathBuf,
}

impl ObjectStore {
    /// Create a store rooted at `objects_dir`.
    pub fn new(fs: Arc<dyn FileOps>, backend: Backend, objects_dir: PathBuf) -> Self {
        Self {
            fs,
            backend,
            objects_dir,
        }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Store `content` and return its hash.
    ///
    /// Nothing is written when the object already exists.
    pub async fn put(&self, content: &[u8]) -> SnapshotResult<String> {
        let hash = hash_bytes(content);
        let path = ObjectLayout::Sharded.path(&self.objects_dir, &hash);

        if self.fs.exists(&path, self.backend).await?.exists {
            debug!(hash = %hash, "Object already stored");
            return Ok(hash);
        }

        if let Some(bucket) = path.parent() {
            self.fs.make_directory(bucket, true, self.backend).await?;
        }
        self.fs.write_binary(&path, content, self.backend).await?;
        debug!(hash = %hash, size = content.len(), "Stored object");

        Ok(hash)
    }

    /// Find the stored path of `hash`, trying each layout in order.
    async fn locate(&self, hash: &str) -> SnapshotResult<Option<PathBuf>> {
        if !is_valid_hash(hash) {
            return Ok(None);
        }
        for layout in ObjectLayout::LOOKUP_ORDER {
            let path = layout.path(&self.objects_dir, hash);
            let status = self.fs.exists(&path, self.backend).await?;
            if status.exists && !status.is_dir {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Fetch an object's bytes.
    pub async fn get(&self, hash: &str) -> SnapshotResult<Option<Vec<u8>>> {
        match self.locate(hash).await? {
            Some(path) => Ok(Some(self.fs.read_binary(&path, self.backend).await?)),
            None => Ok(None),
        }
    }

    /// Whether an object is stored under any layout.
    pub async fn contains(&self, hash: &str) -> SnapshotResult<bool> {
        Ok(self.locate(hash).await?.is_some())
    }

    /// Number of objects in the sharded layout.
    pub async fn count(&self) -> SnapshotResult<usize> {
        let status = self.fs.exists(&self.objects_dir, self.backend).await?;
        if !status.is_dir {
            return Ok(0);
        }
        let files = self
            .fs
            .find_files(&self.objects_dir, "*/*", self.backend)
            .await?;
        Ok(files.len())
    }
}
