//! Checkpoint recording and rewind.

use crate::hook::HookSession;
use crate::{
    Manifest, ManifestSource, ManifestStore, ObjectStore, Scope, SnapshotConfig, SnapshotResult,
    Workspace,
};
use rewind_fs::{FileOps, FsResult};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Checkpoint a rewind to `requested` lands on: the earliest checkpoint
/// strictly after it.
pub fn restore_target(checkpoints: &[i64], requested: i64) -> Option<i64> {
    checkpoints.iter().copied().filter(|&t| t > requested).min()
}

/// What a [`SnapshotEngine::sync`] call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SyncOutcome {
    /// Snapshots are disabled or the workspace root is unusable.
    Skipped,
    /// The current state was written as a new checkpoint.
    Recorded { timestamp: i64 },
    /// An existing checkpoint became the current state.
    Adopted { timestamp: i64 },
    /// The workspace was rewound to an earlier checkpoint.
    Restored(RestoreReport),
}

/// Summary of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    /// Checkpoint the workspace was restored to.
    pub restored_to: i64,
    /// Files written back.
    pub written: Vec<String>,
    /// Files removed because the checkpoint does not contain them.
    pub deleted: Vec<String>,
    /// Files that could not be restored.
    pub skipped: Vec<String>,
    /// Checkpoints discarded by the rewind.
    pub removed_checkpoints: Vec<i64>,
}

impl RestoreReport {
    /// Whether every file was restored.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Ties workspace states to checkpoints and restores them.
///
/// One engine serves any number of workspaces and scopes; all state lives
/// in each workspace's metadata directory.
pub struct SnapshotEngine {
    fs: Arc<dyn FileOps>,
    config: Arc<SnapshotConfig>,
}

impl SnapshotEngine {
    pub fn new(fs: Arc<dyn FileOps>, config: SnapshotConfig) -> Self {
        Self {
            fs,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn file_ops(&self) -> &Arc<dyn FileOps> {
        &self.fs
    }

    /// Resolve a scope name, falling back to the configured default.
    pub fn resolve_scope(&self, name: Option<&str>) -> Scope {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Scope::new(name),
            None => Scope::new(&self.config.default_scope),
        }
    }

    fn metadata_dir(&self, workspace: &Workspace) -> PathBuf {
        workspace.root().join(&self.config.metadata_dir)
    }

    pub fn object_store(&self, workspace: &Workspace) -> ObjectStore {
        ObjectStore::new(
            self.fs.clone(),
            workspace.backend(),
            self.metadata_dir(workspace).join("objects"),
        )
    }

    pub fn manifest_store(&self, workspace: &Workspace) -> ManifestStore {
        ManifestStore::new(
            self.fs.clone(),
            workspace.backend(),
            self.metadata_dir(workspace).join("history"),
        )
    }

    /// Start tracking mutations for one unit of work.
    pub fn begin_session(&self, workspace: Workspace, scope: Scope) -> HookSession {
        let objects = self.object_store(&workspace);
        let manifests = self.manifest_store(&workspace);
        HookSession::new(
            self.fs.clone(),
            workspace,
            scope,
            self.config.clone(),
            objects,
            manifests,
        )
    }

    /// Checkpoint timestamps recorded for a scope, ascending.
    pub async fn checkpoints(&self, workspace: &Workspace, scope: &Scope) -> SnapshotResult<Vec<i64>> {
        self.manifest_store(workspace).list_checkpoints(scope).await
    }

    /// The scope's current state, without persisting a bootstrapped one.
    pub async fn current_state(&self, workspace: &Workspace, scope: &Scope) -> SnapshotResult<Manifest> {
        let (manifest, _) = self.manifest_store(workspace).load_current(scope).await?;
        Ok(manifest)
    }

    /// Bring the scope in line with the checkpoint `target`.
    ///
    /// When checkpoints newer than `target` exist, the workspace is rewound
    /// to the earliest of them and every checkpoint from there on is
    /// discarded. Otherwise the current state is recorded as checkpoint
    /// `target`, or adopted from it when it already exists.
    pub async fn sync(
        &self,
        workspace: &Workspace,
        scope: &Scope,
        target: i64,
    ) -> SnapshotResult<SyncOutcome> {
        if !self.config.enabled {
            debug!(scope = %scope, "Snapshots disabled, skipping sync");
            return Ok(SyncOutcome::Skipped);
        }

        let root = workspace.root();
        match self.fs.exists(root, workspace.backend()).await {
            Ok(status) if status.is_dir => {}
            Ok(_) => {
                warn!(root = %root.display(), "Workspace root is not a directory, skipping sync");
                return Ok(SyncOutcome::Skipped);
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Workspace root unavailable, skipping sync");
                return Ok(SyncOutcome::Skipped);
            }
        }

        let manifests = self.manifest_store(workspace);
        let (current, source) = manifests.load_current(scope).await?;
        if source != ManifestSource::Current {
            manifests.save_current(scope, &current).await?;
        }

        let checkpoints = manifests.list_checkpoints(scope).await?;
        match restore_target(&checkpoints, target) {
            Some(restore_to) => {
                let report = self
                    .restore(workspace, scope, &manifests, &current, &checkpoints, restore_to)
                    .await?;
                Ok(SyncOutcome::Restored(report))
            }
            None => {
                self.record(scope, &manifests, &current, &checkpoints, target)
                    .await
            }
        }
    }

    async fn record(
        &self,
        scope: &Scope,
        manifests: &ManifestStore,
        current: &Manifest,
        checkpoints: &[i64],
        target: i64,
    ) -> SnapshotResult<SyncOutcome> {
        if checkpoints.contains(&target) {
            if let Some(existing) = manifests.load_checkpoint(scope, target).await? {
                manifests.save_current(scope, &existing).await?;
                info!(scope = %scope, timestamp = target, files = existing.len(), "Adopted checkpoint");
                return Ok(SyncOutcome::Adopted { timestamp: target });
            }
            warn!(scope = %scope, timestamp = target, "Replacing unreadable checkpoint");
            manifests.delete_checkpoint(scope, target).await?;
        }

        manifests
            .write_checkpoint(scope, target, &current.relabeled(target))
            .await?;
        info!(scope = %scope, timestamp = target, files = current.len(), "Recorded checkpoint");
        Ok(SyncOutcome::Recorded { timestamp: target })
    }

    async fn restore(
        &self,
        workspace: &Workspace,
        scope: &Scope,
        manifests: &ManifestStore,
        current: &Manifest,
        checkpoints: &[i64],
        restore_to: i64,
    ) -> SnapshotResult<RestoreReport> {
        let target = match manifests.load_checkpoint(scope, restore_to).await? {
            Some(manifest) => manifest,
            None => {
                warn!(scope = %scope, timestamp = restore_to, "Checkpoint unreadable, restoring empty state");
                Manifest::new(restore_to)
            }
        };

        let backend = workspace.backend();
        let objects = self.object_store(workspace);
        let mut report = RestoreReport {
            restored_to: restore_to,
            ..Default::default()
        };

        for key in current.files.keys() {
            if target.files.contains_key(key) {
                continue;
            }
            let path = workspace.resolve(key);
            match self.fs.delete(&path, false, backend).await {
                Ok(()) => {
                    debug!(path = %key, "Deleted file");
                    report.deleted.push(key.clone());
                }
                Err(e) if e.is_not_found() => report.deleted.push(key.clone()),
                Err(e) => {
                    error!(path = %key, error = %e, "Failed to delete file");
                    report.skipped.push(key.clone());
                }
            }
        }

        for (key, hash) in &target.files {
            if current.hash_of(key) == Some(hash.as_str()) {
                continue;
            }

            let content = match objects.get(hash).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    error!(path = %key, hash = %hash, "Object missing, file not restored");
                    report.skipped.push(key.clone());
                    continue;
                }
                Err(e) => {
                    error!(path = %key, hash = %hash, error = %e, "Failed to read object");
                    report.skipped.push(key.clone());
                    continue;
                }
            };

            match self.write_file(workspace, key, &content).await {
                Ok(()) => {
                    debug!(path = %key, "Restored file");
                    report.written.push(key.clone());
                }
                Err(e) => {
                    error!(path = %key, error = %e, "Failed to restore file");
                    report.skipped.push(key.clone());
                }
            }
        }

        manifests.save_current(scope, &target).await?;

        for &timestamp in checkpoints.iter().filter(|&&t| t >= restore_to) {
            if manifests.delete_checkpoint(scope, timestamp).await? {
                report.removed_checkpoints.push(timestamp);
            }
        }

        info!(
            scope = %scope,
            restored_to = restore_to,
            written = report.written.len(),
            deleted = report.deleted.len(),
            skipped = report.skipped.len(),
            removed_checkpoints = report.removed_checkpoints.len(),
            "Rewound workspace"
        );

        Ok(report)
    }

    async fn write_file(&self, workspace: &Workspace, key: &str, content: &[u8]) -> FsResult<()> {
        let path = workspace.resolve(key);
        if let Some(parent) = path.parent() {
            self.fs
                .make_directory(parent, true, workspace.backend())
                .await?;
        }
        self.fs
            .write_binary(&path, content, workspace.backend())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileStat;
    use rewind_fs::{Backend, MemoryFileOps};

    fn setup(fs: MemoryFileOps) -> (Arc<MemoryFileOps>, SnapshotEngine, Workspace) {
        let fs = Arc::new(fs);
        let engine = SnapshotEngine::new(fs.clone(), SnapshotConfig::default());
        (fs, engine, Workspace::new("/w", Backend::Local))
    }

    async fn checkpoint(engine: &SnapshotEngine, ws: &Workspace, ts: i64, files: &[(&str, &str)]) {
        let objects = engine.object_store(ws);
        let mut manifest = Manifest::new(ts);
        for (key, content) in files {
            let hash = objects.put(content.as_bytes()).await.unwrap();
            manifest.insert(*key, hash, FileStat::default());
        }
        engine
            .manifest_store(ws)
            .write_checkpoint(&Scope::default(), ts, &manifest)
            .await
            .unwrap();
    }

    #[test]
    fn test_restore_target_is_strictly_after() {
        assert_eq!(restore_target(&[100, 200, 300], 100), Some(200));
        assert_eq!(restore_target(&[100, 200, 300], 99), Some(100));
        assert_eq!(restore_target(&[300, 100, 200], 150), Some(200));
        assert_eq!(restore_target(&[100, 200], 200), None);
        assert_eq!(restore_target(&[], 0), None);
    }

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(SyncOutcome::Recorded { timestamp: 5 }).unwrap();
        assert_eq!(json["outcome"], "recorded");
        assert_eq!(json["timestamp"], 5);

        let json = serde_json::to_value(SyncOutcome::Restored(RestoreReport {
            restored_to: 7,
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(json["outcome"], "restored");
        assert_eq!(json["restoredTo"], 7);
    }

    #[test]
    fn test_resolve_scope() {
        let fs: Arc<dyn FileOps> = Arc::new(MemoryFileOps::new());
        let engine = SnapshotEngine::new(
            fs,
            SnapshotConfig {
                default_scope: "main".into(),
                ..Default::default()
            },
        );
        assert_eq!(engine.resolve_scope(None).as_str(), "main");
        assert_eq!(engine.resolve_scope(Some("  ")).as_str(), "main");
        assert_eq!(engine.resolve_scope(Some("chat-1")).as_str(), "chat-1");
    }

    #[tokio::test]
    async fn test_sync_missing_root_is_skipped() {
        let (fs, engine, ws) = setup(MemoryFileOps::new());
        let outcome = engine.sync(&ws, &Scope::default(), 10).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert!(fs.file_paths_under("/").is_empty());
    }

    #[tokio::test]
    async fn test_sync_disabled_is_skipped() {
        let fs = Arc::new(MemoryFileOps::new().with_dir("/w"));
        let engine = SnapshotEngine::new(
            fs.clone(),
            SnapshotConfig {
                enabled: false,
                ..Default::default()
            },
        );
        let ws = Workspace::new("/w", Backend::Local);
        let outcome = engine.sync(&ws, &Scope::default(), 10).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(fs.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_records_then_adopts() {
        let (_fs, engine, ws) = setup(MemoryFileOps::new().with_dir("/w"));
        let scope = Scope::default();

        let first = engine.sync(&ws, &scope, 10).await.unwrap();
        assert_eq!(first, SyncOutcome::Recorded { timestamp: 10 });
        let second = engine.sync(&ws, &scope, 10).await.unwrap();
        assert_eq!(second, SyncOutcome::Adopted { timestamp: 10 });
        assert_eq!(engine.checkpoints(&ws, &scope).await.unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn test_sync_replaces_corrupt_checkpoint() {
        let (fs, engine, ws) = setup(MemoryFileOps::new().with_dir("/w"));
        fs.insert_file("/w/.rewind/history/default/10.json", "not json");

        let outcome = engine.sync(&ws, &Scope::default(), 10).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Recorded { timestamp: 10 });
        let manifest = engine
            .manifest_store(&ws)
            .load_checkpoint(&Scope::default(), 10)
            .await
            .unwrap();
        assert_eq!(manifest.map(|m| m.timestamp), Some(10));
    }

    #[tokio::test]
    async fn test_sync_persists_bootstrapped_current() {
        let (fs, engine, ws) = setup(MemoryFileOps::new().with_dir("/w"));
        checkpoint(&engine, &ws, 50, &[("a.txt", "a")]).await;

        engine.sync(&ws, &Scope::default(), 60).await.unwrap();
        assert!(fs
            .file_content("/w/.rewind/history/default/current_state.json")
            .is_some());
        assert_eq!(engine.checkpoints(&ws, &Scope::default()).await.unwrap(), vec![50, 60]);
    }

    #[tokio::test]
    async fn test_restore_skips_missing_objects() {
        let (fs, engine, ws) = setup(
            MemoryFileOps::new()
                .with_dir("/w")
                .with_file("/w/extra.txt", "extra"),
        );
        let scope = Scope::default();

        let objects = engine.object_store(&ws);
        let good = objects.put(b"good").await.unwrap();
        let mut target = Manifest::new(100);
        target.insert("good.txt", good, FileStat::default());
        target.insert("nested/lost.txt", crate::hash_bytes(b"lost"), FileStat::default());
        engine
            .manifest_store(&ws)
            .write_checkpoint(&scope, 100, &target)
            .await
            .unwrap();

        let mut current = Manifest::new(150);
        current.insert("extra.txt", crate::hash_bytes(b"extra"), FileStat::default());
        engine.manifest_store(&ws).save_current(&scope, &current).await.unwrap();

        let SyncOutcome::Restored(report) = engine.sync(&ws, &scope, 50).await.unwrap() else {
            panic!("expected a restore");
        };
        assert_eq!(report.restored_to, 100);
        assert_eq!(report.written, vec!["good.txt"]);
        assert_eq!(report.deleted, vec!["extra.txt"]);
        assert_eq!(report.skipped, vec!["nested/lost.txt"]);
        assert!(!report.is_complete());

        assert_eq!(fs.file_content("/w/good.txt").unwrap(), b"good");
        assert!(fs.file_content("/w/extra.txt").is_none());
        assert!(fs.file_content("/w/nested/lost.txt").is_none());

        // The target still becomes the current state.
        let current = engine.current_state(&ws, &scope).await.unwrap();
        assert!(current.same_content(&target));
        assert!(engine.checkpoints(&ws, &scope).await.unwrap().is_empty());
    }
}
