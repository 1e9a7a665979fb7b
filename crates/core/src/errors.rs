//! Error types for the git-split core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type. [`ExitStatus`] is the stable process exit-code contract.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Map this error onto the process exit-code contract.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Validation(err) => err.exit_status(),
            _ => ExitStatus::Unclassified,
        }
    }
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path is not inside a git working tree.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// Bare repositories have no working tree to split files in.
    #[error("bare repositories are not supported")]
    BareRepository,

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, HEAD) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// HEAD does not point at a local branch.
    #[error("HEAD is detached; check out a branch before splitting")]
    DetachedHead,

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Topology errors
// ---------------------------------------------------------------------------

/// Errors raised while creating, switching, or tracking ephemeral branches.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A branch this run must create already exists. Never retried.
    #[error("branch '{0}' already exists; delete it or pick another prefix")]
    BranchAlreadyExists(String),

    /// A branch this run expected to find is missing.
    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),

    /// A split unit was asked to move to a state it cannot reach.
    #[error("invalid state transition for unit '{unit}' from {from} to {to}")]
    InvalidStateTransition {
        unit: String,
        from: String,
        to: String,
    },

    /// A unit step ran while a different branch was checked out.
    #[error("expected '{expected}' to be checked out, found '{actual}'")]
    NotOnBranch { expected: String, actual: String },

    /// A merge on this branch is waiting to be finished or aborted.
    #[error("a merge is in progress on '{0}'")]
    MergeInProgress(String),

    /// The checked-out branch cannot be deleted.
    #[error("branch '{0}' is checked out and cannot be deleted")]
    BranchCheckedOut(String),

    /// The operation queue referenced a unit the session does not know.
    #[error("unknown split unit index {0}")]
    UnknownUnit(usize),

    /// Underlying git failure.
    #[error("topology git error: {0}")]
    GitError(#[from] GitError),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from the merge orchestrator. The repository is left mid-merge on
/// purpose so the operator can inspect and finish by hand.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Every resolution stage ran and conflicts remain.
    #[error("merging '{branch}' into '{into}' left unresolved conflicts: {}", .paths.join(", "))]
    Unresolved {
        branch: String,
        into: String,
        paths: Vec<String>,
    },

    /// The integration branch conflicted with the original branch.
    #[error("integration branch '{branch}' conflicts with '{into}': {}", .paths.join(", "))]
    IntegrationConflict {
        branch: String,
        into: String,
        paths: Vec<String>,
    },

    /// Underlying git failure.
    #[error("merge git error: {0}")]
    GitError(#[from] GitError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Precondition failures detected before any branch is created.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required arguments: {0}")]
    MissingArguments(String),

    #[error("source file does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("source file is not tracked by git: {}", .0.display())]
    SourceUntracked(PathBuf),

    #[error("content directory does not exist: {}", .0.display())]
    ContentDirMissing(PathBuf),

    #[error("content path is not a directory: {}", .0.display())]
    ContentDirNotDirectory(PathBuf),

    #[error("unsupported strategy '{0}': use MOVE or DELETE")]
    UnsupportedStrategy(String),

    /// A unit or artifact name cannot be used as a branch path segment.
    #[error("'{name}' cannot be used in a branch name: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// Switching branches would clobber local modifications.
    #[error("working tree has uncommitted changes to tracked files")]
    DirtyWorkTree,

    /// Source and target must live in the same working tree.
    #[error("path is not inside the repository working tree: {}", .0.display())]
    NotInWorkTree(PathBuf),

    /// The repository itself could not be opened.
    #[error("validation git error: {0}")]
    GitError(#[from] GitError),
}

impl ValidationError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::MissingArguments(_) => ExitStatus::MissingArguments,
            Self::SourceMissing(_) => ExitStatus::SourceMissing,
            Self::SourceUntracked(_) => ExitStatus::SourceUntracked,
            Self::ContentDirMissing(_) => ExitStatus::ContentDirMissing,
            Self::ContentDirNotDirectory(_) => ExitStatus::ContentDirNotDirectory,
            Self::UnsupportedStrategy(_) => ExitStatus::StrategyUnsupported,
            Self::InvalidBranchName { .. }
            | Self::DirtyWorkTree
            | Self::NotInWorkTree(_)
            | Self::GitError(_) => {
                ExitStatus::Unclassified
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit codes. The numeric values are a stable contract with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Unclassified,
    MissingArguments,
    SourceMissing,
    SourceUntracked,
    ContentDirMissing,
    ContentDirNotDirectory,
    /// Reserved: a strategy value rejected while merging. `Strategy` is a
    /// closed enum, so nothing in this crate produces it.
    StrategyUnsupportedAtMerge,
    StrategyUnsupported,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Unclassified => 64,
            Self::MissingArguments => 65,
            Self::SourceMissing => 66,
            Self::SourceUntracked => 67,
            Self::ContentDirMissing => 68,
            Self::ContentDirNotDirectory => 69,
            Self::StrategyUnsupportedAtMerge => 70,
            Self::StrategyUnsupported => 71,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}
