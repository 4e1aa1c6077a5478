//! Shared utilities for rewind.
//!
//! This crate provides common utilities used across the rewind workspace:
//! - Logging setup with tracing
//! - Workspace-relative path handling

pub mod log;
pub mod path;

pub use log::{LogConfig, LogLevel};
