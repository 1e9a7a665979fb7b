//! Git operations for git-split.

pub mod client;

pub use client::{GitClient, MergeAttempt};
