//! Command handlers for the rewind CLI.

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use rewind_fs::{Backend, FileOps, LocalFileOps};
use rewind_snapshot::{
    now_ms, FileChange, FileOperation, OperationObserver, OperationOutcome, Scope,
    SnapshotConfig, SnapshotEngine, SyncOutcome, Workspace,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs: the engine, the workspace and the scope.
pub struct Context {
    engine: SnapshotEngine,
    workspace: Workspace,
    scope: Scope,
    json: bool,
}

impl Context {
    pub async fn new(root: PathBuf, scope: Option<&str>, json: bool) -> anyhow::Result<Self> {
        let fs: Arc<dyn FileOps> = Arc::new(LocalFileOps::new());
        let workspace = Workspace::new(root, Backend::Local);
        let config = SnapshotConfig::load(fs.as_ref(), &workspace)
            .await
            .context("Failed to load workspace configuration")?;

        let engine = SnapshotEngine::new(fs, config);
        let scope = engine.resolve_scope(scope);
        debug!(root = %workspace.root().display(), scope = %scope, "Using workspace");

        Ok(Self {
            engine,
            workspace,
            scope,
            json,
        })
    }

    pub async fn track(&self, paths: Vec<PathBuf>) -> anyhow::Result<()> {
        let session = self
            .engine
            .begin_session(self.workspace.clone(), self.scope.clone());

        for path in paths {
            let path = if path.is_absolute() {
                path
            } else {
                self.workspace.root().join(path)
            };
            let op = FileOperation::Write {
                path,
                backend: Backend::Local,
            };
            session.on_started(&op).await?;
            session
                .on_completed(&op, &OperationOutcome::Succeeded)
                .await?;
        }

        let tracked = session.manifest().await.map(|m| m.len());
        session.close().await?;

        if self.json {
            let summary = serde_json::json!({
                "scope": self.scope.as_str(),
                "files": tracked,
            });
            println!("{summary}");
            return Ok(());
        }

        match tracked {
            Some(count) => println!("Tracking {count} files in scope {}", self.scope),
            None => println!("Nothing to track"),
        }
        Ok(())
    }

    pub async fn sync(&self, at: Option<i64>) -> anyhow::Result<()> {
        let timestamp = at.unwrap_or_else(now_ms);
        let outcome = self
            .engine
            .sync(&self.workspace, &self.scope, timestamp)
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            SyncOutcome::Skipped => println!("Skipped: workspace unavailable or snapshots disabled"),
            SyncOutcome::Recorded { timestamp } => println!("Recorded checkpoint {timestamp}"),
            SyncOutcome::Adopted { timestamp } => println!("Adopted checkpoint {timestamp}"),
            SyncOutcome::Restored(report) => {
                println!(
                    "Restored checkpoint {}: {} written, {} deleted, {} skipped",
                    report.restored_to,
                    report.written.len(),
                    report.deleted.len(),
                    report.skipped.len()
                );
                for path in &report.skipped {
                    println!("  not restored: {path}");
                }
                if !report.removed_checkpoints.is_empty() {
                    println!(
                        "Discarded {} checkpoint(s)",
                        report.removed_checkpoints.len()
                    );
                }
            }
        }
        Ok(())
    }

    pub async fn preview(&self, at: i64, rewind: bool) -> anyhow::Result<()> {
        let changes = if rewind {
            self.engine
                .preview_changes_for_rewind(&self.workspace, &self.scope, at)
                .await?
        } else {
            self.engine
                .preview_changes(&self.workspace, &self.scope, at)
                .await?
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&changes)?);
        } else if changes.is_empty() {
            println!("No changes");
        } else {
            for change in &changes {
                println!("{}", format_change(change));
            }
        }
        Ok(())
    }

    pub async fn checkpoints(&self) -> anyhow::Result<()> {
        let checkpoints = self.engine.checkpoints(&self.workspace, &self.scope).await?;

        if self.json {
            println!("{}", serde_json::to_string(&checkpoints)?);
        } else if checkpoints.is_empty() {
            println!("No checkpoints in scope {}", self.scope);
        } else {
            for timestamp in checkpoints {
                println!("{timestamp}  {}", format_timestamp(timestamp));
            }
        }
        Ok(())
    }

    pub async fn diff(&self, at: i64, path: &str) -> anyhow::Result<()> {
        let diff = self
            .engine
            .file_diff(&self.workspace, &self.scope, at, path)
            .await?;
        print!("{diff}");
        Ok(())
    }
}

fn format_change(change: &FileChange) -> String {
    format!("{:<8}  {}  ({} lines)", change.kind, change.path, change.lines)
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
