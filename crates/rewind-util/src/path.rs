//! Path utilities.
//!
//! Manifests key files by workspace-relative paths that always use `/` as
//! the separator, independent of the host platform. The helpers here convert
//! between those keys and concrete paths.

use std::path::{Component, Path, PathBuf};

/// Get the rewind configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/rewind` if set
/// - `~/.config/rewind` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rewind"))
}

/// Get the rewind logs directory.
pub fn logs_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("rewind").join("logs"))
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Make a path relative to a root directory, as a `/`-separated key.
///
/// The root itself maps to the empty key. Returns `None` if the path is
/// outside the root.
pub fn relative_key(path: &Path, root: &Path) -> Option<String> {
    let path = normalize(path);
    let root = normalize(root);
    let relative = path.strip_prefix(&root).ok()?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    Some(parts.join("/"))
}

/// Resolve a `/`-separated relative key against a root directory.
///
/// Empty, `.` and `..` components are dropped so the result never leaves
/// the root.
pub fn join_key(root: &Path, key: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in key
        .split('/')
        .filter(|p| !p.is_empty() && *p != "." && *p != "..")
    {
        path.push(part);
    }
    path
}

/// The final component of a relative key.
pub fn key_file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Whether `key` equals `prefix` or lies underneath it.
///
/// Every key lies within the empty prefix.
pub fn key_is_within(key: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
