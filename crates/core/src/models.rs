//! Domain model types used throughout git-split.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::ResolutionStage;
use crate::errors::ValidationError;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// What happens to the originating artifact's own name after the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    /// The source path keeps a (possibly empty) artifact.
    Move,
    /// The source path is expected to be gone.
    Delete,
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOVE" => Ok(Self::Move),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ValidationError::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move => write!(f, "MOVE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Split unit
// ---------------------------------------------------------------------------

/// One entry of the desired-content directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitUnit {
    /// Base file name; the unit's identity.
    pub name: String,
    /// Branch dedicated to this unit.
    pub branch: String,
    /// Repo-relative path the unit's content ends up at.
    pub path: PathBuf,
    /// Desired final content, used verbatim.
    pub content: Vec<u8>,
    /// Whether the name equals the originating artifact's base name.
    pub is_origin: bool,
}

/// Per-unit lifecycle:
/// `Created → CheckedOut → Relocated → ContentWritten → ReadyToMerge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Created,
    CheckedOut,
    Relocated,
    ContentWritten,
    ReadyToMerge,
}

impl UnitState {
    /// The only state reachable from `self`, if any.
    pub fn next(self) -> Option<UnitState> {
        match self {
            Self::Created => Some(Self::CheckedOut),
            Self::CheckedOut => Some(Self::Relocated),
            Self::Relocated => Some(Self::ContentWritten),
            Self::ContentWritten => Some(Self::ReadyToMerge),
            Self::ReadyToMerge => None,
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::CheckedOut => write!(f, "checked_out"),
            Self::Relocated => write!(f, "relocated"),
            Self::ContentWritten => write!(f, "content_written"),
            Self::ReadyToMerge => write!(f, "ready_to_merge"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything fixed for the duration of one run.
#[derive(Debug, Clone)]
pub struct SplitSession {
    /// Working tree root.
    pub repo_root: PathBuf,
    /// Branch that was current when the run started.
    pub original_branch: String,
    /// Repo-relative path of the originating artifact.
    pub source: PathBuf,
    /// Base name of the originating artifact.
    pub source_name: String,
    /// Branch accumulating all unit merges.
    pub integration_branch: String,
    /// Directory the desired contents were read from.
    pub content_dir: PathBuf,
    /// Repo-relative directory relocated units land in.
    pub target_dir: PathBuf,
    pub strategy: Strategy,
    /// Units in directory-listing order.
    pub units: Vec<SplitUnit>,
}

impl SplitSession {
    /// The unit whose name equals the originating artifact's, if any.
    pub fn origin_unit(&self) -> Option<(usize, &SplitUnit)> {
        self.units.iter().enumerate().find(|(_, u)| u.is_origin)
    }

    pub fn unit(&self, index: usize) -> Option<&SplitUnit> {
        self.units.get(index)
    }

    /// Absolute working-tree path for a repo-relative one.
    pub fn absolute(&self, rel: &Path) -> PathBuf {
        self.repo_root.join(rel)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of folding one branch into another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub branch: String,
    pub into: String,
    pub resolution: ResolutionStage,
    /// Merge commit SHA; `None` when the merge was skipped.
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub name: String,
    pub branch: String,
    pub path: PathBuf,
    pub origin: bool,
    /// `None` until the unit's branch exists.
    pub state: Option<UnitState>,
    pub merge: Option<MergeOutcome>,
}

/// Summary of a run, printed by the CLI or serialised as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    pub original_branch: String,
    pub integration_branch: String,
    pub source: PathBuf,
    pub strategy: Strategy,
    pub units: Vec<UnitReport>,
    pub integration_merge: Option<MergeOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
