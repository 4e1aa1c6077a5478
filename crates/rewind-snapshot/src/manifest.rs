//! Manifest data structures.

use chrono::Utc;
use rewind_util::path::key_is_within;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Size and modification time of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    /// Size in bytes.
    pub size: i64,
    /// Last modification, milliseconds since the Unix epoch (0 if unknown).
    pub last_modified: i64,
}

/// A point-in-time map from relative paths to content hashes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// When this state was recorded (milliseconds).
    pub timestamp: i64,

    /// Relative path to content hash.
    pub files: BTreeMap<String, String>,

    /// Relative path to file stats.
    #[serde(default)]
    pub file_stats: BTreeMap<String, FileStat>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// Create an empty manifest timestamped now.
    pub fn empty_now() -> Self {
        Self::new(now_ms())
    }

    /// Copy of this manifest relabeled with another timestamp.
    pub fn relabeled(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    /// Insert or replace a file entry.
    pub fn insert(&mut self, key: impl Into<String>, hash: impl Into<String>, stat: FileStat) {
        let key = key.into();
        self.files.insert(key.clone(), hash.into());
        self.file_stats.insert(key, stat);
    }

    /// Remove `key` and, if it names a directory, every entry beneath it.
    /// The empty key clears the manifest.
    ///
    /// Returns the number of files removed.
    pub fn remove_tree(&mut self, key: &str) -> usize {
        let before = self.files.len();
        self.files.retain(|path, _| !key_is_within(path, key));
        self.file_stats.retain(|path, _| !key_is_within(path, key));
        before - self.files.len()
    }

    /// Hash recorded for a path.
    pub fn hash_of(&self, key: &str) -> Option<&str> {
        self.files.get(key).map(String::as_str)
    }

    /// Whether both manifests track the same paths with the same content.
    pub fn same_content(&self, other: &Manifest) -> bool {
        self.files == other.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Where a loaded current-state manifest came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSource {
    /// The scope's `current_state.json`.
    Current,
    /// Bootstrapped from the checkpoint with this timestamp.
    Checkpoint(i64),
    /// Nothing recorded yet.
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(size: i64) -> FileStat {
        FileStat {
            size,
            last_modified: 0,
        }
    }

    #[test]
    fn test_remove_tree_removes_descendants_only() {
        let mut m = Manifest::new(1);
        m.insert("src", "h0", stat(1));
        m.insert("src/a.rs", "h1", stat(1));
        m.insert("src/deep/b.rs", "h2", stat(1));
        m.insert("src2/c.rs", "h3", stat(1));

        assert_eq!(m.remove_tree("src"), 3);
        assert_eq!(m.files.keys().collect::<Vec<_>>(), vec!["src2/c.rs"]);
        assert_eq!(m.file_stats.len(), 1);

        assert_eq!(m.remove_tree(""), 1);
        assert!(m.is_empty());
        assert!(m.file_stats.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let mut m = Manifest::new(100);
        m.insert(
            "a.txt",
            "abc",
            FileStat {
                size: 5,
                last_modified: 42,
            },
        );
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["timestamp"], 100);
        assert_eq!(json["files"]["a.txt"], "abc");
        assert_eq!(json["fileStats"]["a.txt"]["size"], 5);
        assert_eq!(json["fileStats"]["a.txt"]["lastModified"], 42);
    }

    #[test]
    fn test_parse_without_file_stats() {
        let m: Manifest =
            serde_json::from_str(r#"{"timestamp": 7, "files": {"a.txt": "h"}}"#).unwrap();
        assert_eq!(m.timestamp, 7);
        assert_eq!(m.hash_of("a.txt"), Some("h"));
        assert!(m.file_stats.is_empty());
    }

    #[test]
    fn test_relabeled_keeps_content() {
        let mut m = Manifest::new(1);
        m.insert("a", "h", stat(1));
        let r = m.relabeled(9);
        assert_eq!(r.timestamp, 9);
        assert!(r.same_content(&m));
    }
}
