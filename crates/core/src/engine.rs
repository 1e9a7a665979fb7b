//! The split engine: a single worker that drains a [`SplitPlan`].
//!
//! Every repository operation goes through here one step at a time. The
//! working tree and HEAD are a single shared resource, so there is exactly
//! one engine per run and no step starts before the previous one returned.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cleanup::{CleanupCoordinator, CleanupReport};
use crate::commit_format::CommitFormatter;
use crate::config::AppConfig;
use crate::errors::{CoreError, TopologyError};
use crate::git::GitClient;
use crate::merge::MergeOrchestrator;
use crate::models::{MergeOutcome, SplitReport, SplitSession, UnitReport};
use crate::plan::{BranchRef, SplitPlan, Step};
use crate::topology::Topology;
use crate::unit::UnitProcessor;

/// Passed to the progress callback before each step runs.
#[derive(Debug)]
pub struct StepEvent<'a> {
    /// 1-based position in the plan.
    pub position: usize,
    pub total: usize,
    pub step: Step,
    pub description: String,
    pub session: &'a SplitSession,
}

fn orchestrator<'a>(
    session: &'a SplitSession,
    formatter: &'a CommitFormatter,
    config: &'a AppConfig,
) -> MergeOrchestrator<'a> {
    MergeOrchestrator::new(session, formatter, &config.identity, &config.merge)
}

pub struct SplitEngine {
    git: GitClient,
    session: SplitSession,
    config: AppConfig,
    formatter: CommitFormatter,
    topology: Topology,
    merges: Vec<Option<MergeOutcome>>,
    integration_merge: Option<MergeOutcome>,
    started_at: DateTime<Utc>,
}

impl SplitEngine {
    pub fn new(git: GitClient, session: SplitSession, config: AppConfig) -> Self {
        let formatter = CommitFormatter::new(&config.commit_format);
        let topology = Topology::new(&session);
        let merges = vec![None; session.units.len()];
        Self {
            git,
            session,
            config,
            formatter,
            topology,
            merges,
            integration_merge: None,
            started_at: Utc::now(),
        }
    }

    pub fn session(&self) -> &SplitSession {
        &self.session
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn git(&self) -> &GitClient {
        &self.git
    }

    pub fn plan(&self) -> SplitPlan {
        SplitPlan::build(&self.session)
    }

    /// Run the whole plan.
    pub fn run(&mut self) -> Result<SplitReport, CoreError> {
        self.run_with(|_| {})
    }

    /// Run the whole plan, calling `on_step` before each step.
    ///
    /// On error the repository is left exactly as the failing step left it.
    pub fn run_with<F>(&mut self, mut on_step: F) -> Result<SplitReport, CoreError>
    where
        F: FnMut(&StepEvent<'_>),
    {
        let mut queue = self.plan().into_queue();
        let total = queue.len();
        self.started_at = Utc::now();
        info!(
            source = %self.session.source.display(),
            units = self.session.units.len(),
            steps = total,
            "starting split"
        );

        let mut position = 0;
        while let Some(step) = queue.pop_front() {
            position += 1;
            on_step(&StepEvent {
                position,
                total,
                step,
                description: step.describe(&self.session),
                session: &self.session,
            });
            self.execute(step)?;
        }

        let mut report = self.report();
        report.completed_at = Some(Utc::now());
        info!(integration = %self.session.integration_branch, "split complete");
        Ok(report)
    }

    #[instrument(skip(self))]
    fn execute(&mut self, step: Step) -> Result<(), CoreError> {
        debug!(step = %step.describe(&self.session), "executing");
        match step {
            Step::CreateIntegrationBranch => {
                self.topology
                    .create_integration_branch(&self.git, &self.session)?;
            }
            Step::CreateUnitBranch(i) => {
                self.topology
                    .create_unit_branch(&self.git, &self.session, i)?;
            }
            Step::Checkout(target) => match target {
                BranchRef::Unit(i) => {
                    self.topology.checkout_unit(&self.git, &self.session, i)?;
                }
                other => {
                    let branch = other
                        .resolve(&self.session)
                        .ok_or_else(|| TopologyError::BranchNotFound(format!("{:?}", other)))?
                        .to_string();
                    self.topology.checkout(&self.git, &branch)?;
                }
            },
            Step::Relocate(i) => {
                let processor =
                    UnitProcessor::new(&self.session, &self.formatter, &self.config.identity);
                processor.relocate(&self.git, &mut self.topology, i)?;
            }
            Step::WriteContent(i) => {
                let processor =
                    UnitProcessor::new(&self.session, &self.formatter, &self.config.identity);
                processor.write_content(&self.git, &mut self.topology, i)?;
            }
            Step::MergeUnit(i) => {
                let outcome = orchestrator(&self.session, &self.formatter, &self.config)
                    .merge_unit(&mut self.git, &self.topology, i)?;
                if let Some(slot) = self.merges.get_mut(i) {
                    *slot = Some(outcome);
                }
            }
            Step::ApplyStrategy => {
                orchestrator(&self.session, &self.formatter, &self.config)
                    .apply_strategy(&self.git)?;
            }
            Step::MergeIntegration => {
                let outcome = orchestrator(&self.session, &self.formatter, &self.config)
                    .merge_integration_into_original(&mut self.git, &self.topology)?;
                self.integration_merge = Some(outcome);
            }
        }
        Ok(())
    }

    /// Snapshot of what has happened so far.
    pub fn report(&self) -> SplitReport {
        let units = self
            .session
            .units
            .iter()
            .enumerate()
            .map(|(i, unit)| UnitReport {
                name: unit.name.clone(),
                branch: unit.branch.clone(),
                path: unit.path.clone(),
                origin: unit.is_origin,
                state: self.topology.unit_state(i),
                merge: self.merges.get(i).cloned().flatten(),
            })
            .collect();
        SplitReport {
            original_branch: self.session.original_branch.clone(),
            integration_branch: self.session.integration_branch.clone(),
            source: self.session.source.clone(),
            strategy: self.session.strategy,
            units,
            integration_merge: self.integration_merge.clone(),
            started_at: self.started_at,
            completed_at: None,
        }
    }

    /// Whether HEAD is on the original branch with nothing pending.
    pub fn is_settled(&self) -> Result<bool, CoreError> {
        Ok(self.topology.current_branch() == self.session.original_branch
            && !self.git.merge_in_progress()
            && !self.git.has_uncommitted_changes()?)
    }

    /// Switch back to the original branch, leaving any in-progress merge in
    /// place for inspection.
    pub fn return_to_original(&mut self) -> Result<(), CoreError> {
        self.topology.resync(&self.git)?;
        if self.topology.current_branch() == self.session.original_branch {
            return Ok(());
        }
        if self.git.merge_in_progress() {
            return Err(CoreError::Topology(TopologyError::MergeInProgress(
                self.topology.current_branch().to_string(),
            )));
        }
        let original = self.session.original_branch.clone();
        self.topology.checkout(&self.git, &original)?;
        Ok(())
    }

    /// Abort any merge, return to the original branch and, when
    /// `delete_branches` is set, delete every branch this run created.
    pub fn cleanup(&mut self, delete_branches: bool) -> Result<CleanupReport, CoreError> {
        let coordinator = CleanupCoordinator::new(&self.session);
        if delete_branches {
            return coordinator.run(&self.git, &mut self.topology);
        }
        let mut report = CleanupReport::default();
        coordinator.restore(&self.git, &mut self.topology, &mut report)?;
        Ok(report)
    }
}
