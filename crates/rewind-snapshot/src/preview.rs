//! Change previews between the current state and a checkpoint.
//!
//! Nothing here mutates the workspace or its history.

use crate::engine::restore_target;
use crate::{Manifest, ObjectStore, Scope, SnapshotEngine, SnapshotError, SnapshotResult, Workspace};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, DiffTag, TextDiff};
use std::collections::BTreeSet;
use tracing::debug;

/// How a file differs between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Deleted => "DELETED",
            ChangeKind::Modified => "MODIFIED",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One file a restore would change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    /// Lines added, removed or rewritten.
    pub lines: usize,
}

fn normalize(text: &str) -> String {
    let mut text = text.replace("\r\n", "\n");
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Number of lines in `text`.
pub fn count_lines(text: &str) -> usize {
    normalize(text).lines().count()
}

/// Number of lines that differ between `old` and `new`.
///
/// A replaced block counts as the larger of its two sides.
pub fn changed_lines(old: &str, new: &str) -> usize {
    let old = normalize(old);
    let new = normalize(new);
    TextDiff::from_lines(&old, &new)
        .ops()
        .iter()
        .map(|op| {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => 0,
                DiffTag::Delete => old_range.len(),
                DiffTag::Insert => new_range.len(),
                DiffTag::Replace => old_range.len().max(new_range.len()),
            }
        })
        .sum()
}

/// Unified diff of `old` against `new` with three lines of context.
pub fn unified_diff(old: &str, new: &str, path: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- a/{path}\n"));
    output.push_str(&format!("+++ b/{path}\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };

                output.push_str(sign);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }

    output
}

/// Object content as text; unreadable objects read as `None`.
async fn load_text(objects: &ObjectStore, hash: &str) -> Option<String> {
    match objects.get(hash).await {
        Ok(Some(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Ok(None) => {
            debug!(hash = %hash, "Object missing, counting no lines");
            None
        }
        Err(e) => {
            debug!(hash = %hash, error = %e, "Object unreadable, counting no lines");
            None
        }
    }
}

async fn lines_of(objects: &ObjectStore, hash: &str) -> usize {
    load_text(objects, hash)
        .await
        .map(|text| count_lines(&text))
        .unwrap_or(0)
}

impl SnapshotEngine {
    /// What restoring checkpoint `timestamp` would change, sorted by path.
    ///
    /// A missing checkpoint compares as empty.
    pub async fn preview_changes(
        &self,
        workspace: &Workspace,
        scope: &Scope,
        timestamp: i64,
    ) -> SnapshotResult<Vec<FileChange>> {
        let manifests = self.manifest_store(workspace);
        let (current, _) = manifests.load_current(scope).await?;
        let target = manifests
            .load_checkpoint(scope, timestamp)
            .await?
            .unwrap_or_else(|| Manifest::new(timestamp));

        let objects = self.object_store(workspace);
        let paths: BTreeSet<&String> = current.files.keys().chain(target.files.keys()).collect();
        let mut changes = Vec::new();

        for path in paths {
            let change = match (current.hash_of(path), target.hash_of(path)) {
                (Some(hash), None) => Some((ChangeKind::Deleted, lines_of(&objects, hash).await)),
                (None, Some(hash)) => Some((ChangeKind::Added, lines_of(&objects, hash).await)),
                (Some(now), Some(then)) if now != then => {
                    let lines = match (load_text(&objects, now).await, load_text(&objects, then).await) {
                        (Some(now), Some(then)) => changed_lines(&now, &then),
                        _ => 0,
                    };
                    (lines > 0).then_some((ChangeKind::Modified, lines))
                }
                _ => None,
            };

            if let Some((kind, lines)) = change {
                changes.push(FileChange {
                    path: path.clone(),
                    kind,
                    lines,
                });
            }
        }

        debug!(scope = %scope, timestamp, changes = changes.len(), "Previewed changes");
        Ok(changes)
    }

    /// What a rewind to `rewind_timestamp` would change.
    ///
    /// Empty when no checkpoint lies after `rewind_timestamp`.
    pub async fn preview_changes_for_rewind(
        &self,
        workspace: &Workspace,
        scope: &Scope,
        rewind_timestamp: i64,
    ) -> SnapshotResult<Vec<FileChange>> {
        let checkpoints = self.checkpoints(workspace, scope).await?;
        match restore_target(&checkpoints, rewind_timestamp) {
            Some(restore_to) => self.preview_changes(workspace, scope, restore_to).await,
            None => Ok(Vec::new()),
        }
    }

    /// Unified diff of one file between checkpoint `timestamp` and the
    /// current state.
    pub async fn file_diff(
        &self,
        workspace: &Workspace,
        scope: &Scope,
        timestamp: i64,
        path: &str,
    ) -> SnapshotResult<String> {
        let manifests = self.manifest_store(workspace);
        let checkpoint = manifests
            .load_checkpoint(scope, timestamp)
            .await?
            .ok_or_else(|| SnapshotError::not_found(format!("checkpoint {timestamp}")))?;
        let (current, _) = manifests.load_current(scope).await?;

        let then = checkpoint.hash_of(path);
        let now = current.hash_of(path);
        if then.is_none() && now.is_none() {
            return Err(SnapshotError::not_found(format!(
                "{path} in checkpoint {timestamp}"
            )));
        }

        let objects = self.object_store(workspace);
        let old = match then {
            Some(hash) => load_text(&objects, hash).await.unwrap_or_default(),
            None => String::new(),
        };
        let new = match now {
            Some(hash) => load_text(&objects, hash).await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(unified_diff(&old, &new, path))
    }
}
