//! Workspace snapshots and rewind for rewind.
//!
//! This crate ties point-in-time states of a directory tree to checkpoints
//! and can later restore the tree to any of them:
//! - Track file mutations as they happen ([`HookSession`])
//! - Record checkpoints and rewind to them ([`SnapshotEngine::sync`])
//! - Preview what a rewind would change ([`SnapshotEngine::preview_changes`])
//!
//! File content is stored once per distinct hash in a content-addressed
//! object store under the workspace's metadata directory.
//!
//! # Example
//!
//! ```no_run
//! use rewind_fs::{Backend, LocalFileOps};
//! use rewind_snapshot::{
//!     FileOperation, OperationObserver, OperationOutcome, Scope, SnapshotConfig, SnapshotEngine,
//!     Workspace,
//! };
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SnapshotEngine::new(Arc::new(LocalFileOps::new()), SnapshotConfig::default());
//! let workspace = Workspace::new("/project/root", Backend::Local);
//! let scope = Scope::new("conversation-1");
//!
//! // Track an edit made while handling a message
//! let session = engine.begin_session(workspace.clone(), scope.clone());
//! let op = FileOperation::Write {
//!     path: PathBuf::from("/project/root/src/main.rs"),
//!     backend: Backend::Local,
//! };
//! session.on_started(&op).await?;
//! // ... perform the write ...
//! session.on_completed(&op, &OperationOutcome::Succeeded).await?;
//! session.close().await?;
//!
//! // Checkpoint the message, or rewind to it later
//! engine.sync(&workspace, &scope, 1_700_000_000_000).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
pub mod filter;
mod hook;
mod manifest;
mod manifest_store;
mod object;
mod preview;
mod workspace;

pub use config::{SnapshotConfig, CONFIG_FILE};
pub use engine::{restore_target, RestoreReport, SnapshotEngine, SyncOutcome};
pub use error::{SnapshotError, SnapshotResult};
pub use filter::{is_text_trackable, TrackingRules};
pub use hook::{FileOperation, HookSession, OperationObserver, OperationOutcome, SessionPhase};
pub use manifest::{now_ms, FileStat, Manifest, ManifestSource};
pub use manifest_store::{ManifestStore, CURRENT_STATE_FILE};
pub use object::{hash_bytes, is_valid_hash, ObjectLayout, ObjectStore};
pub use preview::{changed_lines, count_lines, unified_diff, ChangeKind, FileChange};
pub use workspace::{Scope, Workspace};
