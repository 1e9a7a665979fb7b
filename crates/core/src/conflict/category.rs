//! Conflict categories and the actions that settle a single conflict.

use std::fmt;

use git2::Oid;
use serde::{Deserialize, Serialize};

/// How a path conflicts, in `git status` terms.
///
/// Derived from which of the three index stages (ancestor, ours, theirs) are
/// present for the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    BothModified,
    BothAdded,
    AddedByUs,
    AddedByThem,
    DeletedByUs,
    DeletedByThem,
    BothDeleted,
}

impl ConflictCategory {
    /// Classify from stage presence. `None` when no stage is present.
    pub fn classify(ancestor: bool, ours: bool, theirs: bool) -> Option<Self> {
        match (ancestor, ours, theirs) {
            (true, true, true) => Some(Self::BothModified),
            (false, true, true) => Some(Self::BothAdded),
            (false, true, false) => Some(Self::AddedByUs),
            (false, false, true) => Some(Self::AddedByThem),
            (true, false, true) => Some(Self::DeletedByUs),
            (true, true, false) => Some(Self::DeletedByThem),
            (true, false, false) => Some(Self::BothDeleted),
            (false, false, false) => None,
        }
    }

    /// The path did not exist in the merge base.
    pub fn is_addition(self) -> bool {
        matches!(self, Self::BothAdded | Self::AddedByUs | Self::AddedByThem)
    }
}

impl fmt::Display for ConflictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BothModified => write!(f, "both modified"),
            Self::BothAdded => write!(f, "both added"),
            Self::AddedByUs => write!(f, "added by us"),
            Self::AddedByThem => write!(f, "added by them"),
            Self::DeletedByUs => write!(f, "deleted by us"),
            Self::DeletedByThem => write!(f, "deleted by them"),
            Self::BothDeleted => write!(f, "both deleted"),
        }
    }
}

/// Which side wins when both sides still have a version of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// The branch being merged in ("theirs").
    #[default]
    Incoming,
    /// The branch being merged into ("ours").
    Current,
}

/// One conflicted path as found in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    /// Repo-relative path with `/` separators.
    pub path: String,
    pub category: ConflictCategory,
    /// Blob on the current branch's side.
    pub ours: Option<Oid>,
    /// Blob on the incoming branch's side.
    pub theirs: Option<Oid>,
}

impl ConflictEntry {
    /// Stage whichever side survives, preferring `bias`; remove the path when
    /// neither side has it. This is what `git add <path>` does after a
    /// favour-theirs merge has written the surviving side to disk.
    pub fn settle(&self, bias: Bias) -> ConflictAction {
        let (first, second) = match bias {
            Bias::Incoming => (self.theirs, self.ours),
            Bias::Current => (self.ours, self.theirs),
        };
        match first.or(second) {
            Some(blob) => ConflictAction::Take {
                path: self.path.clone(),
                blob,
            },
            None => ConflictAction::Remove {
                path: self.path.clone(),
            },
        }
    }
}

/// A single staging decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    /// Write `blob` to `path` and stage it.
    Take { path: String, blob: Oid },
    /// Delete `path` and stage the removal.
    Remove { path: String },
}

impl ConflictAction {
    pub fn path(&self) -> &str {
        match self {
            Self::Take { path, .. } | Self::Remove { path } => path,
        }
    }
}

/// Somewhere conflicts can be listed and settled.
pub trait ConflictWorkspace {
    type Error;

    /// Paths that are still conflicted.
    fn conflicts(&self) -> Result<Vec<ConflictEntry>, Self::Error>;

    /// Apply one staging decision, clearing the path's conflict.
    fn apply(&mut self, action: &ConflictAction) -> Result<(), Self::Error>;
}
