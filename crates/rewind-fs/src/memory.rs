//! In-memory file operations, for testing and for emulating non-local trees.

use crate::{
    check_backend, compile_pattern, pattern_matches, Backend, DirEntry, FileInfo, FileOps,
    FsError, FsResult, PathStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, MemoryFile>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        path.parent().is_none() || self.dirs.contains(path)
    }

    fn has_children(&self, path: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(path))
            || self.dirs.iter().any(|p| p.parent() == Some(path))
    }

    fn add_dir_all(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.parent().is_none() || ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }
}

/// In-memory file tree.
///
/// Paths are stored exactly as given; the filesystem root (`/`) always
/// exists. Every call is counted, so tests can assert that an operation
/// performed no I/O.
pub struct MemoryFileOps {
    backends: Vec<Backend>,
    tree: RwLock<Tree>,
    calls: AtomicUsize,
}

impl MemoryFileOps {
    /// Create an empty tree serving [`Backend::Local`].
    pub fn new() -> Self {
        Self::with_backends(vec![Backend::Local])
    }

    /// Create an empty tree serving the given backends.
    pub fn with_backends(backends: Vec<Backend>) -> Self {
        Self {
            backends,
            tree: RwLock::new(Tree::default()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed a file, creating its parent directories.
    pub fn with_file(self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Self {
        self.insert_file(path, content);
        self
    }

    /// Seed a directory and its ancestors.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        if let Ok(mut tree) = self.tree.write() {
            tree.add_dir_all(path.as_ref());
        }
        self
    }

    /// Create or replace a file, creating its parent directories.
    ///
    /// This bypasses the call counter.
    pub fn insert_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        let path = path.as_ref();
        if let Ok(mut tree) = self.tree.write() {
            if let Some(parent) = path.parent() {
                tree.add_dir_all(parent);
            }
            tree.files.insert(
                path.to_path_buf(),
                MemoryFile {
                    content: content.as_ref().to_vec(),
                    modified: Utc::now(),
                },
            );
        }
    }

    /// Remove a file. This bypasses the call counter.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        if let Ok(mut tree) = self.tree.write() {
            tree.files.remove(path.as_ref());
        }
    }

    /// Content of a file, if present.
    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let tree = self.tree.read().ok()?;
        tree.files.get(path.as_ref()).map(|f| f.content.clone())
    }

    /// All file paths under a directory, sorted.
    pub fn file_paths_under(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let root = root.as_ref();
        self.tree
            .read()
            .map(|tree| {
                tree.files
                    .keys()
                    .filter(|p| p.starts_with(root))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of provider calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self, backend: Backend) -> FsResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_backend(self, backend)
    }

    fn read_tree(&self) -> FsResult<std::sync::RwLockReadGuard<'_, Tree>> {
        self.tree
            .read()
            .map_err(|e| FsError::LockPoisoned(e.to_string()))
    }

    fn write_tree(&self) -> FsResult<std::sync::RwLockWriteGuard<'_, Tree>> {
        self.tree
            .write()
            .map_err(|e| FsError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryFileOps {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileOps for MemoryFileOps {
    fn backends(&self) -> &[Backend] {
        &self.backends
    }

    async fn exists(&self, path: &Path, backend: Backend) -> FsResult<PathStatus> {
        self.begin(backend)?;
        let tree = self.read_tree()?;
        if tree.files.contains_key(path) {
            Ok(PathStatus::file())
        } else if tree.is_dir(path) {
            Ok(PathStatus::directory())
        } else {
            Ok(PathStatus::missing())
        }
    }

    async fn info(&self, path: &Path, backend: Backend) -> FsResult<FileInfo> {
        self.begin(backend)?;
        let tree = self.read_tree()?;
        if let Some(file) = tree.files.get(path) {
            Ok(FileInfo {
                size: file.content.len() as u64,
                modified: Some(file.modified),
            })
        } else if tree.is_dir(path) {
            Ok(FileInfo {
                size: 0,
                modified: None,
            })
        } else {
            Err(FsError::not_found(path))
        }
    }

    async fn list_directory(&self, path: &Path, backend: Backend) -> FsResult<Vec<DirEntry>> {
        self.begin(backend)?;
        let tree = self.read_tree()?;
        if !tree.is_dir(path) {
            return Err(if tree.files.contains_key(path) {
                FsError::not_a_directory(path)
            } else {
                FsError::not_found(path)
            });
        }

        let name_of = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let mut entries: Vec<DirEntry> = tree
            .dirs
            .iter()
            .filter(|d| d.parent() == Some(path))
            .map(|d| DirEntry {
                name: name_of(d.as_path()),
                is_dir: true,
            })
            .chain(
                tree.files
                    .keys()
                    .filter(|f| f.parent() == Some(path))
                    .map(|f| DirEntry {
                        name: name_of(f.as_path()),
                        is_dir: false,
                    }),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(entries)
    }

    async fn find_files(
        &self,
        root: &Path,
        pattern: &str,
        backend: Backend,
    ) -> FsResult<Vec<PathBuf>> {
        self.begin(backend)?;
        let compiled = compile_pattern(pattern)?;
        let tree = self.read_tree()?;
        if !tree.is_dir(root) {
            return Err(FsError::not_found(root));
        }

        Ok(tree
            .files
            .keys()
            .filter(|p| {
                p.strip_prefix(root)
                    .is_ok_and(|relative| pattern_matches(&compiled, relative))
            })
            .cloned()
            .collect())
    }

    async fn read_binary(&self, path: &Path, backend: Backend) -> FsResult<Vec<u8>> {
        self.begin(backend)?;
        let tree = self.read_tree()?;
        tree.files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| FsError::not_found(path))
    }

    async fn write_binary(&self, path: &Path, content: &[u8], backend: Backend) -> FsResult<()> {
        self.begin(backend)?;
        let mut tree = self.write_tree()?;
        if tree.is_dir(path) {
            return Err(FsError::NotAFile(path.display().to_string()));
        }
        let parent_ok = path.parent().map(|p| tree.is_dir(p)).unwrap_or(false);
        if !parent_ok {
            return Err(FsError::not_found(path));
        }
        tree.files.insert(
            path.to_path_buf(),
            MemoryFile {
                content: content.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &Path, recursive: bool, backend: Backend) -> FsResult<()> {
        self.begin(backend)?;
        let mut tree = self.write_tree()?;
        if tree.files.remove(path).is_some() {
            return Ok(());
        }
        if !tree.dirs.contains(path) {
            return Err(FsError::not_found(path));
        }
        if tree.has_children(path) && !recursive {
            return Err(FsError::DirectoryNotEmpty(path.display().to_string()));
        }
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    async fn make_directory(
        &self,
        path: &Path,
        create_parents: bool,
        backend: Backend,
    ) -> FsResult<()> {
        self.begin(backend)?;
        let mut tree = self.write_tree()?;
        if tree.files.contains_key(path) {
            return Err(FsError::not_a_directory(path));
        }
        if create_parents {
            tree.add_dir_all(path);
            return Ok(());
        }
        let parent_ok = path.parent().map(|p| tree.is_dir(p)).unwrap_or(false);
        if !parent_ok {
            return Err(FsError::not_found(path));
        }
        tree.dirs.insert(path.to_path_buf());
        Ok(())
    }
}
