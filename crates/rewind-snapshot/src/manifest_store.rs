//! Per-scope manifest persistence.
//!
//! ```text
//! history/
//!   <scope>/
//!     current_state.json   # mutable live state
//!     <timestamp>.json     # immutable checkpoints
//! ```

use crate::{Manifest, ManifestSource, Scope, SnapshotResult};
use rewind_fs::{Backend, FileOps};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File name of the current-state manifest.
pub const CURRENT_STATE_FILE: &str = "current_state.json";

/// Reads and writes manifests for each scope.
#[derive(Clone)]
pub struct ManifestStore {
    fs: Arc<dyn FileOps>,
    backend: Backend,
    history_dir: PathBuf,
}

impl ManifestStore {
    /// Create a store rooted at `history_dir`.
    pub fn new(fs: Arc<dyn FileOps>, backend: Backend, history_dir: PathBuf) -> Self {
        Self {
            fs,
            backend,
            history_dir,
        }
    }

    fn scope_dir(&self, scope: &Scope) -> PathBuf {
        self.history_dir.join(scope.as_str())
    }

    fn checkpoint_path(&self, scope: &Scope, timestamp: i64) -> PathBuf {
        self.scope_dir(scope).join(format!("{timestamp}.json"))
    }

    /// Read a manifest file. Missing or undecodable files yield `None`.
    async fn read(&self, path: &Path) -> SnapshotResult<Option<Manifest>> {
        let status = self.fs.exists(path, self.backend).await?;
        if !status.exists || status.is_dir {
            return Ok(None);
        }

        let bytes = self.fs.read_binary(path, self.backend).await?;
        match serde_json::from_slice::<Manifest>(&bytes) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt manifest");
                Ok(None)
            }
        }
    }

    async fn write(&self, scope: &Scope, path: &Path, manifest: &Manifest) -> SnapshotResult<()> {
        self.fs
            .make_directory(&self.scope_dir(scope), true, self.backend)
            .await?;
        let content = serde_json::to_vec_pretty(manifest)?;
        self.fs.write_binary(path, &content, self.backend).await?;
        Ok(())
    }

    /// Load the scope's current state.
    ///
    /// Falls back to the newest readable checkpoint, then to an empty
    /// manifest timestamped now.
    pub async fn load_current(&self, scope: &Scope) -> SnapshotResult<(Manifest, ManifestSource)> {
        let current_path = self.scope_dir(scope).join(CURRENT_STATE_FILE);
        if let Some(manifest) = self.read(&current_path).await? {
            return Ok((manifest, ManifestSource::Current));
        }

        for timestamp in self.list_checkpoints(scope).await?.into_iter().rev() {
            if let Some(manifest) = self.load_checkpoint(scope, timestamp).await? {
                debug!(scope = %scope, timestamp, "Bootstrapped current state from checkpoint");
                return Ok((manifest, ManifestSource::Checkpoint(timestamp)));
            }
        }

        Ok((Manifest::empty_now(), ManifestSource::Empty))
    }

    /// Overwrite the scope's current state.
    pub async fn save_current(&self, scope: &Scope, manifest: &Manifest) -> SnapshotResult<()> {
        let path = self.scope_dir(scope).join(CURRENT_STATE_FILE);
        self.write(scope, &path, manifest).await?;
        debug!(scope = %scope, files = manifest.len(), "Saved current state");
        Ok(())
    }

    /// Write a checkpoint unless one already exists at `timestamp`.
    ///
    /// Returns whether a new checkpoint was written.
    pub async fn write_checkpoint(
        &self,
        scope: &Scope,
        timestamp: i64,
        manifest: &Manifest,
    ) -> SnapshotResult<bool> {
        let path = self.checkpoint_path(scope, timestamp);
        if self.fs.exists(&path, self.backend).await?.exists {
            debug!(scope = %scope, timestamp, "Checkpoint already exists");
            return Ok(false);
        }
        self.write(scope, &path, manifest).await?;
        debug!(scope = %scope, timestamp, files = manifest.len(), "Wrote checkpoint");
        Ok(true)
    }

    /// Checkpoint timestamps for a scope, ascending.
    pub async fn list_checkpoints(&self, scope: &Scope) -> SnapshotResult<Vec<i64>> {
        let dir = self.scope_dir(scope);
        if !self.fs.exists(&dir, self.backend).await?.is_dir {
            return Ok(Vec::new());
        }

        let mut timestamps: Vec<i64> = self
            .fs
            .list_directory(&dir, self.backend)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_dir)
            .filter_map(|entry| {
                entry
                    .name
                    .strip_suffix(".json")
                    .and_then(|stem| stem.parse::<i64>().ok())
            })
            .collect();
        timestamps.sort_unstable();
        timestamps.dedup();

        Ok(timestamps)
    }

    /// Load one checkpoint.
    pub async fn load_checkpoint(
        &self,
        scope: &Scope,
        timestamp: i64,
    ) -> SnapshotResult<Option<Manifest>> {
        self.read(&self.checkpoint_path(scope, timestamp)).await
    }

    /// Delete one checkpoint. Returns whether it existed.
    pub async fn delete_checkpoint(&self, scope: &Scope, timestamp: i64) -> SnapshotResult<bool> {
        let path = self.checkpoint_path(scope, timestamp);
        match self.fs.delete(&path, false, self.backend).await {
            Ok(()) => {
                debug!(scope = %scope, timestamp, "Deleted checkpoint");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
