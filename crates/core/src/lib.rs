//! git-split core library.
//!
//! Splits one tracked file into several while keeping line history: every
//! unit gets an ephemeral branch where the original file is renamed and then
//! rewritten, and the branches are merged back through an integration branch
//! with an ordered conflict-resolution chain.

pub mod cleanup;
pub mod commit_format;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod errors;
pub mod git;
pub mod merge;
pub mod models;
pub mod naming;
pub mod plan;
pub mod topology;
pub mod unit;
pub mod validate;

// Re-exports for convenience.
pub use config::AppConfig;
pub use engine::SplitEngine;
pub use errors::{CoreError, ExitStatus};
pub use models::{SplitReport, SplitSession, Strategy};
pub use plan::SplitPlan;
pub use validate::{prepare, SplitRequest};
