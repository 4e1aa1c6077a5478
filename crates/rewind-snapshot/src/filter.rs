//! Which workspace files are tracked.
//!
//! A file is tracked when its name looks like text and no ignore rule
//! matches it or any of its parent directories.

use crate::{SnapshotConfig, Workspace};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use rewind_fs::FileOps;
use rewind_util::path::key_file_name;
use std::path::Path;
use tracing::{debug, warn};

/// Entries that are never tracked, in addition to the metadata directory.
pub const ALWAYS_IGNORED: &[&str] = &[".git", ".svn", ".hg", ".DS_Store", "Thumbs.db"];

/// Extensions of files whose content is tracked.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "adoc", "org", "rs", "toml", "lock", "json", "jsonc", "json5",
    "yaml", "yml", "xml", "ini", "cfg", "conf", "env", "properties", "csv", "tsv", "sql", "c",
    "h", "cc", "cpp", "cxx", "hpp", "hh", "cs", "java", "kt", "kts", "scala", "groovy", "gradle",
    "go", "py", "pyi", "rb", "php", "pl", "pm", "lua", "r", "swift", "m", "mm", "dart", "ex",
    "exs", "erl", "hrl", "hs", "ml", "mli", "fs", "fsx", "clj", "cljs", "elm", "zig", "nim", "v",
    "js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx", "vue", "svelte", "astro", "html", "htm",
    "css", "scss", "sass", "less", "svg", "sh", "bash", "zsh", "fish", "ps1", "bat", "cmd",
    "proto", "graphql", "gql", "tf", "hcl", "nix", "dockerfile", "mk", "cmake", "tex", "bib",
    "log", "diff", "patch",
];

/// Extensionless file names whose content is tracked.
const TEXT_FILE_NAMES: &[&str] = &[
    "Makefile",
    "Dockerfile",
    "Containerfile",
    "Rakefile",
    "Gemfile",
    "Procfile",
    "Justfile",
    "justfile",
    "LICENSE",
    "README",
    "CHANGELOG",
    "AUTHORS",
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
    ".env",
];

/// Whether a file's name marks it as text content worth tracking.
pub fn is_text_trackable(file_name: &str) -> bool {
    is_text_trackable_with(file_name, &[])
}

/// Like [`is_text_trackable`], also accepting `extra_extensions`.
pub fn is_text_trackable_with(file_name: &str, extra_extensions: &[String]) -> bool {
    if TEXT_FILE_NAMES.contains(&file_name) {
        return true;
    }
    let Some((stem, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        // Dotfiles such as `.bashrc` have no extension.
        return false;
    }
    let extension = extension.to_ascii_lowercase();
    TEXT_EXTENSIONS.contains(&extension.as_str())
        || extra_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&extension))
}

/// Ignore rules and text eligibility for one workspace.
pub struct TrackingRules {
    matcher: Gitignore,
    rules: Vec<String>,
    extra_extensions: Vec<String>,
}

impl TrackingRules {
    /// Build rules from gitignore-style lines.
    ///
    /// Lines that fail to compile are skipped.
    pub fn new(root: &Path, rules: Vec<String>, extra_extensions: Vec<String>) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for line in &rules {
            if let Err(e) = builder.add_line(None, line) {
                warn!(rule = %line, error = %e, "Skipping invalid ignore rule");
            }
        }
        let matcher = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to compile ignore rules");
            Gitignore::empty()
        });

        Self {
            matcher,
            rules,
            extra_extensions,
        }
    }

    /// Load the workspace's `.gitignore` plus built-in and configured rules.
    pub async fn load(fs: &dyn FileOps, workspace: &Workspace, config: &SnapshotConfig) -> Self {
        let mut rules = Vec::new();

        let gitignore = workspace.root().join(".gitignore");
        match fs.exists(&gitignore, workspace.backend()).await {
            Ok(status) if status.exists && !status.is_dir => {
                match fs.read_text(&gitignore, workspace.backend()).await {
                    Ok(content) => rules.extend(
                        content
                            .lines()
                            .map(str::trim_end)
                            .filter(|l| !l.is_empty() && !l.starts_with('#'))
                            .map(String::from),
                    ),
                    Err(e) => warn!(error = %e, "Could not read .gitignore"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not check for .gitignore"),
        }

        rules.extend(config.ignore_patterns.iter().cloned());
        // Built-ins go last so that no negated pattern can re-include them.
        rules.push(config.metadata_dir.clone());
        rules.extend(ALWAYS_IGNORED.iter().map(|s| s.to_string()));

        debug!(count = rules.len(), "Loaded ignore rules");
        Self::new(workspace.root(), rules, config.text_extensions.clone())
    }

    /// The rule lines in effect.
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Whether a relative path, or any directory above it, is ignored.
    pub fn should_ignore(&self, key: &str, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(Path::new(key), is_dir)
            .is_ignore()
    }

    /// Whether a file name is text-trackable under these rules.
    pub fn is_text_trackable(&self, file_name: &str) -> bool {
        is_text_trackable_with(file_name, &self.extra_extensions)
    }

    /// Whether a file at `key` should be tracked.
    pub fn accepts_file(&self, key: &str) -> bool {
        self.is_text_trackable(key_file_name(key)) && !self.should_ignore(key, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_fs::{Backend, MemoryFileOps};

    #[test]
    fn test_text_trackable() {
        assert!(is_text_trackable("main.rs"));
        assert!(is_text_trackable("README.MD"));
        assert!(is_text_trackable("Makefile"));
        assert!(is_text_trackable(".gitignore"));
        assert!(!is_text_trackable("image.png"));
        assert!(!is_text_trackable("binary"));
        assert!(!is_text_trackable(".bashrc"));
    }

    #[test]
    fn test_extra_extensions() {
        let extra = vec![".foo".to_string()];
        assert!(is_text_trackable_with("a.FOO", &extra));
        assert!(!is_text_trackable("a.foo"));
    }

    #[test]
    fn test_should_ignore_parents() {
        let rules = TrackingRules::new(
            Path::new("/w"),
            vec!["target/".into(), "*.log".into(), ".rewind".into()],
            Vec::new(),
        );
        assert!(rules.should_ignore("target/debug/out.txt", false));
        assert!(rules.should_ignore("logs/app.log", false));
        assert!(rules.should_ignore(".rewind/history/default/1.json", false));
        assert!(!rules.should_ignore("src/main.rs", false));
        assert!(!rules.accepts_file("app.log"));
        assert!(rules.accepts_file("src/main.rs"));
    }

    #[tokio::test]
    async fn test_load_combines_sources() {
        let fs = MemoryFileOps::new().with_file("/w/.gitignore", "# build\ndist/\n!keep.log\n");
        let ws = Workspace::new("/w", Backend::Local);
        let config = SnapshotConfig {
            ignore_patterns: vec!["*.tmp".into()],
            ..Default::default()
        };

        let rules = TrackingRules::load(&fs, &ws, &config).await;
        assert!(rules.should_ignore("dist/app.js", false));
        assert!(rules.should_ignore("a.tmp", false));
        assert!(rules.should_ignore(".rewind/objects/ab/x", false));
        assert!(rules.should_ignore(".git/HEAD", false));
        assert!(!rules.should_ignore("src/app.js", false));
        assert!(rules.rules().iter().any(|r| r == "dist/"));
    }
}
