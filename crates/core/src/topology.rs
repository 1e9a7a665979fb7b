//! Topology manager: creates, switches and deletes the ephemeral branches of
//! a run, and is the only place that changes which branch is checked out.

use tracing::{info, warn};

use crate::errors::TopologyError;
use crate::git::GitClient;
use crate::models::{SplitSession, UnitState};

/// Branch bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct Topology {
    current_branch: String,
    created: Vec<String>,
    unit_states: Vec<Option<UnitState>>,
}

impl Topology {
    /// Start from the session's original branch, with nothing created.
    pub fn new(session: &SplitSession) -> Self {
        Self {
            current_branch: session.original_branch.clone(),
            created: Vec::new(),
            unit_states: vec![None; session.units.len()],
        }
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    /// Branches this run created, in creation order.
    pub fn created_branches(&self) -> &[String] {
        &self.created
    }

    pub fn unit_state(&self, index: usize) -> Option<UnitState> {
        self.unit_states.get(index).copied().flatten()
    }

    /// Create the integration branch at the original branch's tip.
    pub fn create_integration_branch(
        &mut self,
        git: &GitClient,
        session: &SplitSession,
    ) -> Result<(), TopologyError> {
        self.create(git, &session.integration_branch, &session.original_branch)
    }

    /// Create a unit's branch at the integration branch's current tip.
    pub fn create_unit_branch(
        &mut self,
        git: &GitClient,
        session: &SplitSession,
        index: usize,
    ) -> Result<(), TopologyError> {
        let unit = session.unit(index).ok_or(TopologyError::UnknownUnit(index))?;
        self.create(git, &unit.branch, &session.integration_branch)?;
        self.unit_states[index] = Some(UnitState::Created);
        Ok(())
    }

    fn create(&mut self, git: &GitClient, name: &str, from: &str) -> Result<(), TopologyError> {
        if git.branch_exists(name)? {
            return Err(TopologyError::BranchAlreadyExists(name.to_string()));
        }
        if !git.branch_exists(from)? {
            return Err(TopologyError::BranchNotFound(from.to_string()));
        }
        git.create_branch(name, from)?;
        self.created.push(name.to_string());
        Ok(())
    }

    /// Switch the working tree to `branch`.
    pub fn checkout(&mut self, git: &GitClient, branch: &str) -> Result<(), TopologyError> {
        if !git.branch_exists(branch)? {
            return Err(TopologyError::BranchNotFound(branch.to_string()));
        }
        git.checkout_branch(branch)?;
        info!(from = %self.current_branch, to = branch, "switched branch");
        self.current_branch = branch.to_string();
        Ok(())
    }

    /// Switch to a unit's branch and mark it checked out.
    pub fn checkout_unit(
        &mut self,
        git: &GitClient,
        session: &SplitSession,
        index: usize,
    ) -> Result<(), TopologyError> {
        let unit = session.unit(index).ok_or(TopologyError::UnknownUnit(index))?;
        self.checkout(git, &unit.branch)?;
        self.advance(session, index, UnitState::CheckedOut)
    }

    /// Fail unless `index` is currently in `expected`.
    pub fn ensure_state(
        &self,
        session: &SplitSession,
        index: usize,
        expected: UnitState,
    ) -> Result<(), TopologyError> {
        let unit = session.unit(index).ok_or(TopologyError::UnknownUnit(index))?;
        match self.unit_state(index) {
            Some(state) if state == expected => Ok(()),
            other => Err(TopologyError::InvalidStateTransition {
                unit: unit.name.clone(),
                from: other.map(|s| s.to_string()).unwrap_or_else(|| "absent".into()),
                to: expected
                    .next()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "merge".into()),
            }),
        }
    }

    /// Move a unit to `to`, which must be the state right after its current one.
    pub fn advance(
        &mut self,
        session: &SplitSession,
        index: usize,
        to: UnitState,
    ) -> Result<(), TopologyError> {
        let unit = session.unit(index).ok_or(TopologyError::UnknownUnit(index))?;
        let from = self.unit_state(index);
        if from.and_then(UnitState::next) != Some(to) {
            return Err(TopologyError::InvalidStateTransition {
                unit: unit.name.clone(),
                from: from.map(|s| s.to_string()).unwrap_or_else(|| "absent".into()),
                to: to.to_string(),
            });
        }
        self.unit_states[index] = Some(to);
        Ok(())
    }

    /// Force-delete a branch. An absent branch counts as deleted; returns
    /// whether anything was removed.
    pub fn delete_branch(&mut self, git: &GitClient, branch: &str) -> Result<bool, TopologyError> {
        if branch == self.current_branch {
            warn!(branch, "refusing to delete the checked-out branch");
            return Err(TopologyError::BranchCheckedOut(branch.to_string()));
        }
        let removed = git.delete_branch(branch)?;
        self.created.retain(|b| b != branch);
        Ok(removed)
    }

    /// Re-read HEAD after something outside this type may have moved it.
    pub fn resync(&mut self, git: &GitClient) -> Result<(), TopologyError> {
        self.current_branch = git.current_branch()?;
        Ok(())
    }
}
