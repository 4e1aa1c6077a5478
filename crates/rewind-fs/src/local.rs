//! Host filesystem provider.

use crate::{
    check_backend, compile_pattern, pattern_matches, Backend, DirEntry, FileInfo, FileOps,
    FsError, FsResult, PathStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File operations against the host filesystem.
///
/// Serves [`Backend::Local`] only.
#[derive(Debug, Clone, Default)]
pub struct LocalFileOps;

impl LocalFileOps {
    /// Create a new local provider.
    pub fn new() -> Self {
        Self
    }
}

fn map_not_found(e: std::io::Error, path: &Path) -> FsError {
    if e.kind() == ErrorKind::NotFound {
        FsError::not_found(path)
    } else {
        FsError::Io(e)
    }
}

#[async_trait]
impl FileOps for LocalFileOps {
    fn backends(&self) -> &[Backend] {
        &[Backend::Local]
    }

    async fn exists(&self, path: &Path, backend: Backend) -> FsResult<PathStatus> {
        check_backend(self, backend)?;
        match fs::metadata(path).await {
            Ok(meta) => Ok(PathStatus {
                exists: true,
                is_dir: meta.is_dir(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PathStatus::missing()),
            Err(e) => Err(FsError::Io(e)),
        }
    }

    async fn info(&self, path: &Path, backend: Backend) -> FsResult<FileInfo> {
        check_backend(self, backend)?;
        let meta = fs::metadata(path)
            .await
            .map_err(|e| map_not_found(e, path))?;
        Ok(FileInfo {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn list_directory(&self, path: &Path, backend: Backend) -> FsResult<Vec<DirEntry>> {
        check_backend(self, backend)?;
        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| map_not_found(e, path))?;

        let mut results = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            results.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(results)
    }

    async fn find_files(
        &self,
        root: &Path,
        pattern: &str,
        backend: Backend,
    ) -> FsResult<Vec<PathBuf>> {
        check_backend(self, backend)?;
        let compiled = compile_pattern(pattern)?;
        debug!(root = %root.display(), pattern, "Finding files");

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if pattern_matches(&compiled, relative) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();

        Ok(files)
    }

    async fn read_binary(&self, path: &Path, backend: Backend) -> FsResult<Vec<u8>> {
        check_backend(self, backend)?;
        fs::read(path).await.map_err(|e| map_not_found(e, path))
    }

    async fn write_binary(&self, path: &Path, content: &[u8], backend: Backend) -> FsResult<()> {
        check_backend(self, backend)?;
        debug!(path = %path.display(), bytes = content.len(), "Writing file");
        fs::write(path, content)
            .await
            .map_err(|e| map_not_found(e, path))
    }

    async fn delete(&self, path: &Path, recursive: bool, backend: Backend) -> FsResult<()> {
        check_backend(self, backend)?;
        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| map_not_found(e, path))?;
        debug!(path = %path.display(), recursive, "Deleting");

        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(path).await?;
            } else {
                fs::remove_dir(path).await.map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        FsError::not_found(path)
                    } else if fs_dir_has_entries(path) {
                        FsError::DirectoryNotEmpty(path.display().to_string())
                    } else {
                        FsError::Io(e)
                    }
                })?;
            }
        } else {
            fs::remove_file(path).await?;
        }

        Ok(())
    }

    async fn make_directory(
        &self,
        path: &Path,
        create_parents: bool,
        backend: Backend,
    ) -> FsResult<()> {
        check_backend(self, backend)?;
        if create_parents {
            fs::create_dir_all(path).await?;
        } else {
            fs::create_dir(path)
                .await
                .map_err(|e| map_not_found(e, path))?;
        }
        Ok(())
    }
}

fn fs_dir_has_entries(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_read_and_info() {
        let dir = tempdir().unwrap();
        let fs = LocalFileOps::new();
        let file = dir.path().join("a.txt");

        fs.write_binary(&file, b"hello", Backend::Local).await.unwrap();

        assert_eq!(fs.read_text(&file, Backend::Local).await.unwrap(), "hello");
        let info = fs.info(&file, Backend::Local).await.unwrap();
        assert_eq!(info.size, 5);
        assert!(info.modified.is_some());
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = tempdir().unwrap();
        let fs = LocalFileOps::new();

        let status = fs.exists(dir.path(), Backend::Local).await.unwrap();
        assert!(status.exists && status.is_dir);

        let status = fs
            .exists(&dir.path().join("missing"), Backend::Local)
            .await
            .unwrap();
        assert!(!status.exists);
    }

    #[tokio::test]
    async fn test_rejects_other_backends() {
        let dir = tempdir().unwrap();
        let fs = LocalFileOps::new();
        let err = fs.exists(dir.path(), Backend::Sandbox).await.unwrap_err();
        assert!(matches!(err, FsError::UnsupportedBackend(Backend::Sandbox)));
    }

    #[tokio::test]
    async fn test_find_files_and_list() {
        let dir = tempdir().unwrap();
        let fs = LocalFileOps::new();
        let src = dir.path().join("src");
        fs.make_directory(&src.join("nested"), true, Backend::Local)
            .await
            .unwrap();
        fs.write_binary(&src.join("lib.rs"), b"", Backend::Local)
            .await
            .unwrap();
        fs.write_binary(&src.join("nested/mod.rs"), b"", Backend::Local)
            .await
            .unwrap();
        fs.write_binary(&src.join("notes.md"), b"", Backend::Local)
            .await
            .unwrap();

        let all = fs.find_files(&src, "**/*", Backend::Local).await.unwrap();
        assert_eq!(all.len(), 3);

        let rust = fs.find_files(&src, "**/*.rs", Backend::Local).await.unwrap();
        assert_eq!(rust, vec![src.join("lib.rs"), src.join("nested/mod.rs")]);

        let entries = fs.list_directory(&src, Backend::Local).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["lib.rs", "nested", "notes.md"]);
        assert!(entries[1].is_dir);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let fs = LocalFileOps::new();
        let sub = dir.path().join("sub");
        fs.make_directory(&sub, false, Backend::Local).await.unwrap();
        fs.write_binary(&sub.join("f.txt"), b"x", Backend::Local)
            .await
            .unwrap();

        let err = fs.delete(&sub, false, Backend::Local).await.unwrap_err();
        assert!(matches!(err, FsError::DirectoryNotEmpty(_)));

        fs.delete(&sub, true, Backend::Local).await.unwrap();
        assert!(!fs.exists(&sub, Backend::Local).await.unwrap().exists);

        let err = fs.delete(&sub, true, Backend::Local).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_write_without_parent_fails() {
        let dir = tempdir().unwrap();
        let fs = LocalFileOps::new();
        let err = fs
            .write_binary(&dir.path().join("no/such/dir.txt"), b"x", Backend::Local)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
