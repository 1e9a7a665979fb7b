//! Merge-conflict classification and the ordered resolution chain.
//!
//! The conflict subsystem is responsible for:
//! 1. **Classification** -- turning index conflict entries into the
//!    categories `git status` reports ("added by us", "deleted by them", ...).
//! 2. **Resolution** -- trying a fixed sequence of strategies until the index
//!    is conflict-free, or reporting what is left.
//!
//! Strategies only *plan* [`ConflictAction`]s; a [`ConflictWorkspace`] applies
//! them. The git client is one workspace, tests use an in-memory one.

pub mod category;
pub mod resolver;

pub use category::{Bias, ConflictAction, ConflictCategory, ConflictEntry, ConflictWorkspace};
pub use resolver::{
    ChainOutcome, ResolutionChain, ResolutionStage, ResolutionStrategy, StageAdditions,
    StageOrigin,
};
