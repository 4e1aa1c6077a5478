//! Rewind - workspace snapshots tied to checkpoints.
//!
//! This is the main entry point for the rewind CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::Context;
use rewind_util::{log, LogConfig, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(author, version, about = "Workspace snapshots with checkpoint rewind", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// History scope, e.g. a conversation id
    #[arg(short, long, global = true)]
    scope: Option<String>,

    /// Print output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot the given paths into the current state
    Track {
        /// Files or directories that changed
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },

    /// Record a checkpoint, or rewind when later checkpoints exist
    Sync {
        /// Checkpoint timestamp in milliseconds (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Show what restoring a checkpoint would change
    Preview {
        /// Checkpoint timestamp in milliseconds
        #[arg(long)]
        at: i64,

        /// Treat the timestamp as a rewind point, as `sync` would
        #[arg(long)]
        rewind: bool,
    },

    /// List recorded checkpoints
    Checkpoints,

    /// Diff one file between a checkpoint and the current state
    Diff {
        /// Checkpoint timestamp in milliseconds
        #[arg(long)]
        at: i64,

        /// Path relative to the workspace root
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    log::init(LogConfig {
        print: true,
        level: if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        },
        include_location: cli.verbose,
        file: cli.log_file.clone(),
    });

    let cwd = std::env::current_dir()?;
    let root = match cli.root {
        Some(root) if root.is_absolute() => root,
        Some(root) => cwd.join(root),
        None => cwd,
    };

    let ctx = Context::new(root, cli.scope.as_deref(), cli.json).await?;

    match cli.command {
        Commands::Track { paths } => ctx.track(paths).await,
        Commands::Sync { at } => ctx.sync(at).await,
        Commands::Preview { at, rewind } => ctx.preview(at, rewind).await,
        Commands::Checkpoints => ctx.checkpoints().await,
        Commands::Diff { at, path } => ctx.diff(at, &path).await,
    }
}
