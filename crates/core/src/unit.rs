//! Split-unit processor: relocation and content commits on a unit branch.
//!
//! Each non-origin unit gets two commits. The first is a pure rename of the
//! originating artifact to the unit's path, so blame can follow every line
//! back to the original file. The second replaces the content wholesale.
//! The origin unit stays where it is and only gets the content commit.

use git2::Oid;
use tracing::{info, instrument, warn};

use crate::commit_format::CommitFormatter;
use crate::config::IdentityConfig;
use crate::errors::{CoreError, TopologyError};
use crate::git::GitClient;
use crate::models::{SplitSession, UnitState};
use crate::topology::Topology;

pub struct UnitProcessor<'a> {
    session: &'a SplitSession,
    formatter: &'a CommitFormatter,
    identity: &'a IdentityConfig,
}

impl<'a> UnitProcessor<'a> {
    pub fn new(
        session: &'a SplitSession,
        formatter: &'a CommitFormatter,
        identity: &'a IdentityConfig,
    ) -> Self {
        Self {
            session,
            formatter,
            identity,
        }
    }

    /// `CheckedOut -> Relocated`. Returns the rename commit, if one was made.
    #[instrument(skip(self, git, topology))]
    pub fn relocate(
        &self,
        git: &GitClient,
        topology: &mut Topology,
        index: usize,
    ) -> Result<Option<Oid>, CoreError> {
        topology.ensure_state(self.session, index, UnitState::CheckedOut)?;
        let unit = self
            .session
            .unit(index)
            .ok_or(TopologyError::UnknownUnit(index))?;
        self.ensure_on_branch(topology, &unit.branch)?;

        let source = &self.session.source;
        if !self.session.absolute(source).exists() {
            warn!(
                unit = %unit.name,
                path = %source.display(),
                "originating artifact missing on unit branch, restoring from original branch"
            );
            git.restore_path_from(&self.session.original_branch, source)?;
        }

        let commit = if unit.is_origin {
            info!(unit = %unit.name, "origin unit keeps its path");
            None
        } else {
            git.move_path(source, &unit.path)?;
            let sig = git.user_signature(self.identity)?;
            let message = self.formatter.format_relocate(source, unit);
            let oid = git.commit_staged(&message, &sig)?;
            info!(unit = %unit.name, to = %unit.path.display(), sha = %oid, "relocated artifact");
            Some(oid)
        };

        topology.advance(self.session, index, UnitState::Relocated)?;
        Ok(commit)
    }

    /// `Relocated -> ContentWritten -> ReadyToMerge`. Always commits, even
    /// when the content is unchanged.
    #[instrument(skip(self, git, topology))]
    pub fn write_content(
        &self,
        git: &GitClient,
        topology: &mut Topology,
        index: usize,
    ) -> Result<Oid, CoreError> {
        topology.ensure_state(self.session, index, UnitState::Relocated)?;
        let unit = self
            .session
            .unit(index)
            .ok_or(TopologyError::UnknownUnit(index))?;
        self.ensure_on_branch(topology, &unit.branch)?;

        git.write_file(&unit.path, &unit.content)?;
        git.stage_path(&unit.path)?;
        topology.advance(self.session, index, UnitState::ContentWritten)?;

        let sig = git.user_signature(self.identity)?;
        let message = self.formatter.format_content(&self.session.source, unit);
        let oid = git.commit_staged(&message, &sig)?;
        info!(unit = %unit.name, bytes = unit.content.len(), sha = %oid, "wrote unit content");

        topology.advance(self.session, index, UnitState::ReadyToMerge)?;
        Ok(oid)
    }

    fn ensure_on_branch(&self, topology: &Topology, branch: &str) -> Result<(), TopologyError> {
        if topology.current_branch() != branch {
            return Err(TopologyError::NotOnBranch {
                expected: branch.to_string(),
                actual: topology.current_branch().to_string(),
            });
        }
        Ok(())
    }
}
