//! Workspaces and history scopes.

use crate::SnapshotResult;
use rewind_fs::Backend;
use rewind_util::path;
use std::fmt;
use std::path::{Path, PathBuf};

/// A directory tree served by one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    backend: Backend,
}

impl Workspace {
    /// Create a workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, backend: Backend) -> Self {
        Self {
            root: path::normalize(&root.into()),
            backend,
        }
    }

    /// Create a workspace from an optional environment tag.
    pub fn with_environment(root: impl Into<PathBuf>, environment: Option<&str>) -> SnapshotResult<Self> {
        Ok(Self::new(root, Backend::parse(environment)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Relative key for `path` when it lies inside this workspace and is
    /// served by the same backend.
    pub fn relative_key(&self, path: &Path, backend: Backend) -> Option<String> {
        if backend != self.backend {
            return None;
        }
        path::relative_key(path, &self.root)
    }

    /// Absolute path for a relative key.
    pub fn resolve(&self, key: &str) -> PathBuf {
        path::join_key(&self.root, key)
    }
}

/// Namespace isolating one conversation's backup history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(String);

impl Scope {
    /// Namespace used for blank or missing scopes.
    pub const DEFAULT: &'static str = "default";

    /// Create a scope, replacing characters that cannot appear in a single
    /// path component.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Self(Self::DEFAULT.to_string());
        }
        if name.chars().all(|c| c == '.') {
            return Self("_".repeat(name.len()));
        }
        let sanitized: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        Self(sanitized)
    }

    /// Resolve an optional scope name.
    pub fn resolve(name: Option<&str>) -> Self {
        Self::new(name.unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
