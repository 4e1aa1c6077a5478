//! Snapshot configuration.

use crate::{SnapshotError, SnapshotResult, Workspace};
use rewind_fs::FileOps;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the optional per-workspace configuration file.
pub const CONFIG_FILE: &str = "rewind.json";

/// Configuration for snapshot tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotConfig {
    /// Whether snapshots are enabled.
    pub enabled: bool,

    /// Metadata directory, relative to the workspace root.
    pub metadata_dir: String,

    /// Scope used when none is given.
    pub default_scope: String,

    /// Extra gitignore-style patterns that are never tracked.
    pub ignore_patterns: Vec<String>,

    /// Extra file extensions (without the dot) treated as text.
    pub text_extensions: Vec<String>,

    /// Files larger than this many bytes are not tracked.
    pub max_file_size: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metadata_dir: ".rewind".to_string(),
            default_scope: crate::Scope::DEFAULT.to_string(),
            ignore_patterns: Vec::new(),
            text_extensions: Vec::new(),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

impl SnapshotConfig {
    /// Load configuration from `rewind.json` in the workspace root.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub async fn load(fs: &dyn FileOps, workspace: &Workspace) -> SnapshotResult<Self> {
        let path = workspace.root().join(CONFIG_FILE);
        let status = fs.exists(&path, workspace.backend()).await?;
        if !status.exists || status.is_dir {
            debug!(path = %path.display(), "No workspace config, using defaults");
            return Ok(Self::default());
        }

        let content = fs.read_text(&path, workspace.backend()).await?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| SnapshotError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;

        debug!(path = %path.display(), "Loaded workspace config");
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> SnapshotResult<()> {
        let dir = self.metadata_dir.trim();
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains(['/', '\\']) {
            return Err(SnapshotError::config(format!(
                "metadataDir must be a single directory name, got {:?}",
                self.metadata_dir
            )));
        }
        Ok(())
    }
}
