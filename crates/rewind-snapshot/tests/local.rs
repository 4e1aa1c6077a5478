//! Checkpoint and rewind against the host filesystem.

use rewind_fs::{Backend, LocalFileOps};
use rewind_snapshot::{
    FileOperation, OperationObserver, OperationOutcome, Scope, SnapshotConfig, SnapshotEngine,
    SyncOutcome, Workspace, CONFIG_FILE,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, SnapshotEngine, Workspace) {
    let dir = TempDir::new().unwrap();
    let engine = SnapshotEngine::new(Arc::new(LocalFileOps::new()), SnapshotConfig::default());
    let workspace = Workspace::new(dir.path(), Backend::Local);
    (dir, engine, workspace)
}

async fn observe_write(engine: &SnapshotEngine, workspace: &Workspace, path: &Path) {
    let session = engine.begin_session(workspace.clone(), Scope::default());
    let op = FileOperation::Write {
        path: path.to_path_buf(),
        backend: Backend::Local,
    };
    session.on_started(&op).await.unwrap();
    session
        .on_completed(&op, &OperationOutcome::Succeeded)
        .await
        .unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_rewind_on_disk() {
    let (dir, engine, workspace) = setup();
    let scope = Scope::default();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();

    fs::write(src.join("main.rs"), "fn main() {}\n").unwrap();
    observe_write(&engine, &workspace, &src).await;
    engine.sync(&workspace, &scope, 100).await.unwrap();

    fs::write(src.join("main.rs"), "fn main() { todo!() }\n").unwrap();
    fs::write(src.join("extra.rs"), "// extra\n").unwrap();
    observe_write(&engine, &workspace, &src).await;
    engine.sync(&workspace, &scope, 200).await.unwrap();

    let outcome = engine.sync(&workspace, &scope, 99).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Restored(ref r) if r.restored_to == 100));

    assert_eq!(
        fs::read_to_string(src.join("main.rs")).unwrap(),
        "fn main() {}\n"
    );
    assert!(!src.join("extra.rs").exists());
    assert!(engine.checkpoints(&workspace, &scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metadata_layout_on_disk() {
    let (dir, engine, workspace) = setup();
    fs::write(dir.path().join("notes.md"), "# notes\n").unwrap();
    observe_write(&engine, &workspace, &dir.path().join("notes.md")).await;
    engine
        .sync(&workspace, &Scope::new("chat"), 42)
        .await
        .unwrap();

    let history = dir.path().join(".rewind/history/chat");
    assert!(history.join("current_state.json").is_file());
    assert!(history.join("42.json").is_file());

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(history.join("42.json")).unwrap()).unwrap();
    assert_eq!(manifest["timestamp"], 42);
    let hash = manifest["files"]["notes.md"].as_str().unwrap();
    assert_eq!(manifest["fileStats"]["notes.md"]["size"], 8);
    assert!(dir
        .path()
        .join(".rewind/objects")
        .join(&hash[..2])
        .join(hash)
        .is_file());
}

#[tokio::test]
async fn test_gitignore_is_respected() {
    let (dir, engine, workspace) = setup();
    fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
    fs::create_dir_all(dir.path().join("target/debug")).unwrap();
    fs::write(dir.path().join("target/debug/build.log"), "noise").unwrap();
    fs::write(dir.path().join("lib.rs"), "").unwrap();

    observe_write(&engine, &workspace, &dir.path().join("target")).await;
    observe_write(&engine, &workspace, &dir.path().join("lib.rs")).await;

    let current = engine
        .current_state(&workspace, &Scope::default())
        .await
        .unwrap();
    assert_eq!(current.files.keys().collect::<Vec<_>>(), vec!["lib.rs"]);
}

#[tokio::test]
async fn test_workspace_config_file() {
    let (dir, _engine, workspace) = setup();
    fs::write(
        dir.path().join(CONFIG_FILE),
        r#"{"metadataDir": ".history", "maxFileSize": 4}"#,
    )
    .unwrap();

    let config = SnapshotConfig::load(&LocalFileOps::new(), &workspace)
        .await
        .unwrap();
    assert_eq!(config.metadata_dir, ".history");
    assert_eq!(config.max_file_size, 4);

    let engine = SnapshotEngine::new(Arc::new(LocalFileOps::new()), config);
    fs::write(dir.path().join("small.txt"), "abc").unwrap();
    fs::write(dir.path().join("large.txt"), "abcdef").unwrap();
    observe_write(&engine, &workspace, &dir.path().join("small.txt")).await;
    observe_write(&engine, &workspace, &dir.path().join("large.txt")).await;
    engine.sync(&workspace, &Scope::default(), 1).await.unwrap();

    assert!(dir.path().join(".history/history/default/1.json").is_file());
    let current = engine
        .current_state(&workspace, &Scope::default())
        .await
        .unwrap();
    assert_eq!(current.files.keys().collect::<Vec<_>>(), vec!["small.txt"]);
}
