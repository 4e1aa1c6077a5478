//! Backend kinds that can serve a workspace.

use crate::{FsError, FsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of file-operations backend serving a workspace.
///
/// Resolved once from a string tag when a workspace is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The host filesystem.
    #[default]
    Local,
    /// A sandboxed tree (container or VM).
    Sandbox,
    /// A remote mount.
    Remote,
}

impl Backend {
    /// All backend kinds.
    pub const ALL: [Backend; 3] = [Backend::Local, Backend::Sandbox, Backend::Remote];

    /// Resolve an optional environment tag.
    ///
    /// A missing or blank tag means the local filesystem.
    pub fn parse(tag: Option<&str>) -> FsResult<Self> {
        match tag.map(str::trim) {
            None | Some("") => Ok(Backend::Local),
            Some(tag) => tag.parse(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Sandbox => "sandbox",
            Backend::Remote => "remote",
        }
    }
}

impl FromStr for Backend {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "host" => Ok(Backend::Local),
            "sandbox" | "docker" | "podman" | "lima" | "container" => Ok(Backend::Sandbox),
            "remote" | "ssh" => Ok(Backend::Remote),
            other => Err(FsError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
