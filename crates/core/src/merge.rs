//! Merge orchestrator: folds unit branches into the integration branch and
//! the integration branch into the original branch.

use std::path::Path;

use git2::{Oid, Signature};
use tracing::{debug, info, instrument, warn};

use crate::commit_format::CommitFormatter;
use crate::config::{IdentityConfig, MergeConfig};
use crate::conflict::{ChainOutcome, ResolutionChain, ResolutionStage};
use crate::errors::{GitError, MergeError};
use crate::git::{GitClient, MergeAttempt};
use crate::models::{MergeOutcome, SplitSession, Strategy};
use crate::topology::Topology;

/// Unit indices in merge order: every non-origin unit in listing order,
/// then the origin unit.
pub fn merge_order(session: &SplitSession) -> Vec<usize> {
    let (origin, others): (Vec<usize>, Vec<usize>) =
        (0..session.units.len()).partition(|&i| session.units[i].is_origin);
    others.into_iter().chain(origin).collect()
}

/// Path as it appears in the index.
fn index_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub struct MergeOrchestrator<'a> {
    session: &'a SplitSession,
    formatter: &'a CommitFormatter,
    identity: &'a IdentityConfig,
    detect_renames: bool,
}

impl<'a> MergeOrchestrator<'a> {
    pub fn new(
        session: &'a SplitSession,
        formatter: &'a CommitFormatter,
        identity: &'a IdentityConfig,
        merge: &MergeConfig,
    ) -> Self {
        Self {
            session,
            formatter,
            identity,
            detect_renames: merge.detect_renames,
        }
    }

    /// Fixed author for synthetic merge commits.
    fn merge_signature(&self) -> Result<Signature<'static>, GitError> {
        Ok(Signature::now(&self.identity.name, &self.identity.email)?)
    }

    fn commit(&self, git: &GitClient, branch: &str, into: &str, their: Oid) -> Result<Oid, GitError> {
        let sig = self.merge_signature()?;
        let message = self.formatter.format_merge(branch, into);
        git.commit_merge(&message, &sig, their)
    }

    /// Fold one unit branch into the checked-out branch.
    ///
    /// A missing branch is a no-op. Conflicts go through
    /// [`ResolutionChain::standard`]; if that leaves anything conflicted the
    /// merge is left in progress and [`MergeError::Unresolved`] is returned.
    #[instrument(skip(self, git, topology))]
    pub fn merge_unit(
        &self,
        git: &mut GitClient,
        topology: &Topology,
        index: usize,
    ) -> Result<MergeOutcome, MergeError> {
        let into = topology.current_branch().to_string();
        let branch = match self.session.unit(index) {
            Some(unit) => unit.branch.clone(),
            None => {
                warn!(index, "no such unit, nothing to merge");
                return Ok(MergeOutcome {
                    branch: String::new(),
                    into,
                    resolution: ResolutionStage::Skipped,
                    commit: None,
                });
            }
        };

        if !git.branch_exists(&branch)? {
            warn!(branch = %branch, "unit branch does not exist, skipping merge");
            return Ok(MergeOutcome {
                branch,
                into,
                resolution: ResolutionStage::Skipped,
                commit: None,
            });
        }

        let (resolution, their) = match git.merge_branch(&branch, self.detect_renames)? {
            MergeAttempt::UpToDate => {
                info!(branch = %branch, into = %into, "already merged");
                return Ok(MergeOutcome {
                    branch,
                    into,
                    resolution: ResolutionStage::UpToDate,
                    commit: None,
                });
            }
            MergeAttempt::Clean { their } => (ResolutionStage::Clean, their),
            MergeAttempt::Conflicted { their } => {
                let chain = ResolutionChain::standard(&index_path(&self.session.source));
                debug!(branch = %branch, stages = ?chain.stages(), "merge conflicted, running fallback chain");
                match chain.resolve(git)? {
                    ChainOutcome::Resolved(stage) => (stage, their),
                    ChainOutcome::Unresolved(remaining) => {
                        return Err(MergeError::Unresolved {
                            branch,
                            into,
                            paths: remaining.into_iter().map(|c| c.path).collect(),
                        });
                    }
                }
            }
        };

        let oid = self.commit(git, &branch, &into, their)?;
        info!(branch = %branch, into = %into, resolution = %resolution, sha = %oid, "merged unit branch");
        Ok(MergeOutcome {
            branch,
            into,
            resolution,
            commit: Some(oid.to_string()),
        })
    }

    /// Merge every unit in [`merge_order`], stopping at the first failure.
    pub fn merge_all_units(
        &self,
        git: &mut GitClient,
        topology: &Topology,
    ) -> Result<Vec<(usize, MergeOutcome)>, MergeError> {
        let mut outcomes = Vec::with_capacity(self.session.units.len());
        for index in merge_order(self.session) {
            outcomes.push((index, self.merge_unit(git, topology, index)?));
        }
        Ok(outcomes)
    }

    /// Settle the originating artifact's name on the integration branch.
    ///
    /// Relocation already vacated the source path, and an origin unit put
    /// content back there. `MOVE` without an origin unit commits an empty
    /// file at the source path so the name survives; `DELETE` leaves it gone.
    /// Returns the placeholder commit, if one was made.
    pub fn apply_strategy(&self, git: &GitClient) -> Result<Option<Oid>, MergeError> {
        let source = &self.session.source;
        let tracked = git.is_tracked(source)?;
        match self.session.strategy {
            Strategy::Move => match self.session.origin_unit() {
                Some((_, origin)) => {
                    debug!(path = %source.display(), unit = %origin.name, tracked, "MOVE: source keeps the origin unit's content");
                    Ok(None)
                }
                None if tracked => {
                    debug!(path = %source.display(), "MOVE: source path still tracked");
                    Ok(None)
                }
                None => {
                    git.write_file(source, &[])?;
                    git.stage_path(source)?;
                    let sig = self.merge_signature()?;
                    let message = self.formatter.format_keep_source(source);
                    let oid = git.commit_staged(&message, &sig)?;
                    info!(path = %source.display(), sha = %oid, "MOVE: left an empty file at the source path");
                    Ok(Some(oid))
                }
            },
            Strategy::Delete => {
                if tracked {
                    warn!(
                        path = %source.display(),
                        "DELETE: source path is still tracked after merging all units"
                    );
                } else {
                    debug!(path = %source.display(), "DELETE: source path is gone");
                }
                Ok(None)
            }
        }
    }

    /// Fold the integration branch into the checked-out (original) branch.
    /// Any conflict is fatal.
    #[instrument(skip(self, git, topology))]
    pub fn merge_integration_into_original(
        &self,
        git: &mut GitClient,
        topology: &Topology,
    ) -> Result<MergeOutcome, MergeError> {
        let branch = self.session.integration_branch.clone();
        let into = topology.current_branch().to_string();

        match git.merge_branch(&branch, self.detect_renames)? {
            MergeAttempt::UpToDate => {
                info!(branch = %branch, into = %into, "nothing to merge");
                Ok(MergeOutcome {
                    branch,
                    into,
                    resolution: ResolutionStage::UpToDate,
                    commit: None,
                })
            }
            MergeAttempt::Clean { their } => {
                let oid = self.commit(git, &branch, &into, their)?;
                info!(branch = %branch, into = %into, sha = %oid, "merged integration branch");
                Ok(MergeOutcome {
                    branch,
                    into,
                    resolution: ResolutionStage::Clean,
                    commit: Some(oid.to_string()),
                })
            }
            MergeAttempt::Conflicted { .. } => {
                let paths = git.conflicts()?.into_iter().map(|c| c.path).collect();
                Err(MergeError::IntegrationConflict {
                    branch,
                    into,
                    paths,
                })
            }
        }
    }
}
