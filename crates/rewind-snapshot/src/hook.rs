//! Incremental tracking of workspace mutations.
//!
//! The operation-executing layer reports each file operation to an
//! [`OperationObserver`] before and after it runs. A [`HookSession`] uses
//! those reports to keep the scope's current-state manifest in step with
//! the workspace, snapshotting every file it sees change.

use crate::filter::TrackingRules;
use crate::{
    FileStat, Manifest, ManifestSource, ManifestStore, ObjectStore, Scope, SnapshotConfig,
    SnapshotResult, Workspace,
};
use async_trait::async_trait;
use rewind_fs::{Backend, FileOps};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A file operation performed against some backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    Read {
        path: PathBuf,
        backend: Backend,
    },
    List {
        path: PathBuf,
        backend: Backend,
    },
    Write {
        path: PathBuf,
        backend: Backend,
    },
    /// An in-place edit of existing content.
    ApplyContent {
        path: PathBuf,
        backend: Backend,
    },
    Delete {
        path: PathBuf,
        backend: Backend,
    },
    Move {
        source: PathBuf,
        destination: PathBuf,
        backend: Backend,
    },
    /// Copy, possibly between backends.
    Copy {
        source: PathBuf,
        source_backend: Backend,
        destination: PathBuf,
        destination_backend: Backend,
    },
}

impl FileOperation {
    /// Whether the operation can change workspace content.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Read { .. } | Self::List { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::List { .. } => "list",
            Self::Write { .. } => "write",
            Self::ApplyContent { .. } => "apply_content",
            Self::Delete { .. } => "delete",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
        }
    }

    /// Every path the operation touches, with the backend serving it.
    pub fn paths(&self) -> Vec<(&Path, Backend)> {
        match self {
            Self::Read { path, backend }
            | Self::List { path, backend }
            | Self::Write { path, backend }
            | Self::ApplyContent { path, backend }
            | Self::Delete { path, backend } => vec![(path.as_path(), *backend)],
            Self::Move {
                source,
                destination,
                backend,
            } => vec![(source.as_path(), *backend), (destination.as_path(), *backend)],
            Self::Copy {
                source,
                source_backend,
                destination,
                destination_backend,
            } => vec![
                (source.as_path(), *source_backend),
                (destination.as_path(), *destination_backend),
            ],
        }
    }
}

/// How a file operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Failed(String),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Receives file operations from the layer that executes them.
///
/// Calls for one observer must not overlap; each returns only after any
/// work it triggered has finished.
#[async_trait]
pub trait OperationObserver: Send + Sync {
    /// Called before the operation runs.
    async fn on_started(&self, op: &FileOperation) -> SnapshotResult<()>;

    /// Called after the operation finished.
    async fn on_completed(
        &self,
        op: &FileOperation,
        outcome: &OperationOutcome,
    ) -> SnapshotResult<()>;
}

/// Lifecycle of a [`HookSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initialized,
    Closed,
}

struct Tracking {
    manifest: Manifest,
    rules: TrackingRules,
}

enum SessionState {
    Uninitialized,
    Initialized(Box<Tracking>),
    Closed,
}

/// Tracks mutations for one unit of work (one message-processing turn).
///
/// Initialization is lazy: nothing is loaded until the first mutating
/// operation that touches the workspace, and a session that never sees one
/// does no I/O at all, including on [`close`](Self::close).
pub struct HookSession {
    fs: Arc<dyn FileOps>,
    workspace: Workspace,
    scope: Scope,
    config: Arc<SnapshotConfig>,
    objects: ObjectStore,
    manifests: ManifestStore,
    state: Mutex<SessionState>,
    closed: AtomicBool,
}

impl HookSession {
    pub(crate) fn new(
        fs: Arc<dyn FileOps>,
        workspace: Workspace,
        scope: Scope,
        config: Arc<SnapshotConfig>,
        objects: ObjectStore,
        manifests: ManifestStore,
    ) -> Self {
        Self {
            fs,
            workspace,
            scope,
            config,
            objects,
            manifests,
            state: Mutex::new(SessionState::Uninitialized),
            closed: AtomicBool::new(false),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub async fn phase(&self) -> SessionPhase {
        match &*self.state.lock().await {
            SessionState::Uninitialized => SessionPhase::Uninitialized,
            SessionState::Initialized(_) => SessionPhase::Initialized,
            SessionState::Closed => SessionPhase::Closed,
        }
    }

    /// The in-memory manifest, once initialized.
    pub async fn manifest(&self) -> Option<Manifest> {
        match &*self.state.lock().await {
            SessionState::Initialized(tracking) => Some(tracking.manifest.clone()),
            _ => None,
        }
    }

    /// Relative keys of the operation's paths inside this workspace.
    fn affected_keys(&self, op: &FileOperation) -> BTreeSet<String> {
        op.paths()
            .into_iter()
            .filter_map(|(path, backend)| self.workspace.relative_key(path, backend))
            .collect()
    }

    async fn initialize(&self) -> Tracking {
        let (manifest, source) = match self.manifests.load_current(&self.scope).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(scope = %self.scope, error = %e, "Could not load current state, starting empty");
                (Manifest::empty_now(), ManifestSource::Empty)
            }
        };
        let rules = TrackingRules::load(self.fs.as_ref(), &self.workspace, &self.config).await;

        debug!(
            scope = %self.scope,
            files = manifest.len(),
            source = ?source,
            "Hook session initialized"
        );
        Tracking { manifest, rules }
    }

    /// Re-snapshot one relative path after a mutation.
    ///
    /// The empty key stands for the workspace root.
    async fn refresh(&self, tracking: &mut Tracking, key: &str) -> SnapshotResult<()> {
        let removed = tracking.manifest.remove_tree(key);
        let path = self.workspace.resolve(key);
        let backend = self.workspace.backend();

        let status = self.fs.exists(&path, backend).await?;
        if !status.exists {
            debug!(path = %key, removed, "Path gone, untracked");
            return Ok(());
        }

        if status.is_dir {
            if !key.is_empty() && tracking.rules.should_ignore(key, true) {
                return Ok(());
            }
            let files = self.collect_files(&tracking.rules, key, path).await?;
            for (file_key, file) in files {
                self.track_file(tracking, &file_key, &file).await;
            }
        } else if tracking.rules.accepts_file(key) {
            self.track_file(tracking, key, &path).await;
        }

        Ok(())
    }

    /// Trackable files below a directory. Ignored directories are not
    /// entered.
    async fn collect_files(
        &self,
        rules: &TrackingRules,
        key: &str,
        dir: PathBuf,
    ) -> SnapshotResult<Vec<(String, PathBuf)>> {
        let backend = self.workspace.backend();
        let mut pending = vec![(key.to_string(), dir)];
        let mut files = Vec::new();

        while let Some((dir_key, dir)) = pending.pop() {
            for entry in self.fs.list_directory(&dir, backend).await? {
                let child_key = if dir_key.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{dir_key}/{}", entry.name)
                };
                let child = dir.join(&entry.name);

                if entry.is_dir {
                    if rules.should_ignore(&child_key, true) {
                        debug!(path = %child_key, "Skipping ignored directory");
                    } else {
                        pending.push((child_key, child));
                    }
                } else if rules.accepts_file(&child_key) {
                    files.push((child_key, child));
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Snapshot a file into the object store and record it.
    async fn track_file(&self, tracking: &mut Tracking, key: &str, path: &Path) {
        match self.snapshot_entry(path).await {
            Ok(Some((hash, stat))) => {
                debug!(path = %key, hash = %hash, "Tracked file");
                tracking.manifest.insert(key, hash, stat);
            }
            Ok(None) => debug!(path = %key, "File too large, not tracked"),
            Err(e) => warn!(path = %key, error = %e, "Failed to snapshot file"),
        }
    }

    async fn snapshot_entry(&self, path: &Path) -> SnapshotResult<Option<(String, FileStat)>> {
        let backend = self.workspace.backend();
        let content = self.fs.read_binary(path, backend).await?;
        if content.len() as u64 > self.config.max_file_size {
            return Ok(None);
        }

        let hash = self.objects.put(&content).await?;
        let stat = match self.fs.info(path, backend).await {
            Ok(info) => FileStat {
                size: info.size as i64,
                last_modified: info.modified_ms(),
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No metadata, using content length");
                FileStat {
                    size: content.len() as i64,
                    last_modified: 0,
                }
            }
        };

        Ok(Some((hash, stat)))
    }

    /// Persist the tracked state. Safe to call more than once.
    pub async fn close(&self) -> SnapshotResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let previous = std::mem::replace(&mut *self.state.lock().await, SessionState::Closed);
        if let SessionState::Initialized(tracking) = previous {
            self.manifests
                .save_current(&self.scope, &tracking.manifest)
                .await?;
            info!(
                scope = %self.scope,
                files = tracking.manifest.len(),
                "Hook session saved current state"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl OperationObserver for HookSession {
    async fn on_started(&self, op: &FileOperation) -> SnapshotResult<()> {
        if !self.config.enabled || !op.is_mutating() || self.affected_keys(op).is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        if matches!(*state, SessionState::Uninitialized) {
            let tracking = self.initialize().await;
            *state = SessionState::Initialized(Box::new(tracking));
        }

        Ok(())
    }

    async fn on_completed(
        &self,
        op: &FileOperation,
        outcome: &OperationOutcome,
    ) -> SnapshotResult<()> {
        if !outcome.is_success() || !op.is_mutating() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let SessionState::Initialized(tracking) = &mut *state else {
            return Ok(());
        };

        for key in self.affected_keys(op) {
            self.refresh(tracking, &key).await?;
        }
        debug!(op = op.kind(), files = tracking.manifest.len(), "Applied operation");

        Ok(())
    }
}
