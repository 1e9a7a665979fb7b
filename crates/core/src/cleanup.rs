//! Rollback and cleanup of a run's ephemeral branches.

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::CoreError;
use crate::git::GitClient;
use crate::models::SplitSession;
use crate::topology::Topology;

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// An in-progress merge was discarded.
    pub aborted_merge: bool,
    /// The original branch was checked out again.
    pub restored_original: bool,
    pub deleted: Vec<String>,
    /// Branches that were already gone.
    pub absent: Vec<String>,
    /// Branches left alone because they are checked out.
    pub skipped: Vec<String>,
}

pub struct CleanupCoordinator<'a> {
    session: &'a SplitSession,
}

impl<'a> CleanupCoordinator<'a> {
    pub fn new(session: &'a SplitSession) -> Self {
        Self { session }
    }

    /// Abort any in-progress merge and switch back to the original branch.
    pub fn restore(
        &self,
        git: &GitClient,
        topology: &mut Topology,
        report: &mut CleanupReport,
    ) -> Result<(), CoreError> {
        if git.merge_in_progress() {
            git.abort_merge()?;
            report.aborted_merge = true;
        }
        topology.resync(git)?;
        if topology.current_branch() != self.session.original_branch {
            topology.checkout(git, &self.session.original_branch)?;
            report.restored_original = true;
        }
        Ok(())
    }

    /// Delete every branch this run created, newest first. Branches that
    /// already existed before the run are never touched. Absent branches
    /// count as success.
    pub fn delete_branches(
        &self,
        git: &GitClient,
        topology: &mut Topology,
        report: &mut CleanupReport,
    ) -> Result<(), CoreError> {
        let branches: Vec<String> = topology.created_branches().iter().rev().cloned().collect();
        for branch in branches {
            if branch == topology.current_branch() {
                warn!(branch = %branch, "branch is checked out, leaving it in place");
                report.skipped.push(branch);
                continue;
            }
            if topology.delete_branch(git, &branch)? {
                report.deleted.push(branch);
            } else {
                report.absent.push(branch);
            }
        }
        info!(
            deleted = report.deleted.len(),
            absent = report.absent.len(),
            "ephemeral branches cleaned up"
        );
        Ok(())
    }

    /// Full cleanup: restore, then delete.
    pub fn run(&self, git: &GitClient, topology: &mut Topology) -> Result<CleanupReport, CoreError> {
        let mut report = CleanupReport::default();
        self.restore(git, topology, &mut report)?;
        self.delete_branches(git, topology, &mut report)?;
        Ok(report)
    }
}
