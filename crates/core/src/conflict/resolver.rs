//! The ordered conflict-resolution chain.
//!
//! A merge is first attempted with a favour-incoming bias. Whatever that
//! leaves conflicted is handed to each [`ResolutionStrategy`] in turn until
//! the workspace reports no conflicts. If the chain runs out, the remaining
//! entries are returned and the merge is left in place for an operator.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::category::{Bias, ConflictAction, ConflictEntry, ConflictWorkspace};

/// Which step of the merge protocol produced the final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    /// The branch did not exist; nothing was merged.
    Skipped,
    /// The branch was already contained in the target.
    UpToDate,
    /// The biased merge produced no conflicts.
    Clean,
    /// Staging the originating artifact's path settled every conflict.
    OriginStaged,
    /// Staging every independently added path settled every conflict.
    AdditionsStaged,
}

impl std::fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::UpToDate => write!(f, "up to date"),
            Self::Clean => write!(f, "clean"),
            Self::OriginStaged => write!(f, "origin staged"),
            Self::AdditionsStaged => write!(f, "additions staged"),
        }
    }
}

/// One fallback step: decides, without touching the repository, how to
/// stage some subset of the conflicts.
pub trait ResolutionStrategy {
    fn stage(&self) -> ResolutionStage;

    /// Staging decisions for the conflicts this strategy handles.
    fn plan(&self, conflicts: &[ConflictEntry], bias: Bias) -> Vec<ConflictAction>;

    /// Whether applying [`Self::plan`] would leave nothing conflicted.
    fn resolves(&self, conflicts: &[ConflictEntry], bias: Bias) -> bool {
        let planned = self.plan(conflicts, bias);
        conflicts
            .iter()
            .all(|c| planned.iter().any(|a| a.path() == c.path))
    }
}

/// Stage the originating artifact's path. Handles the two-sided edit of the
/// not-yet-renamed source file.
#[derive(Debug, Clone)]
pub struct StageOrigin {
    pub path: String,
}

impl ResolutionStrategy for StageOrigin {
    fn stage(&self) -> ResolutionStage {
        ResolutionStage::OriginStaged
    }

    fn plan(&self, conflicts: &[ConflictEntry], bias: Bias) -> Vec<ConflictAction> {
        conflicts
            .iter()
            .filter(|c| c.path == self.path)
            .map(|c| c.settle(bias))
            .collect()
    }
}

/// Stage every path that was added independently on one or both sides.
/// Handles the shapes that appear once several unit branches have been
/// folded in and each created the same new path.
#[derive(Debug, Clone, Default)]
pub struct StageAdditions;

impl ResolutionStrategy for StageAdditions {
    fn stage(&self) -> ResolutionStage {
        ResolutionStage::AdditionsStaged
    }

    fn plan(&self, conflicts: &[ConflictEntry], bias: Bias) -> Vec<ConflictAction> {
        conflicts
            .iter()
            .filter(|c| c.category.is_addition())
            .map(|c| c.settle(bias))
            .collect()
    }
}

/// How the chain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    Resolved(ResolutionStage),
    Unresolved(Vec<ConflictEntry>),
}

/// Strategies tried in order after a biased merge.
pub struct ResolutionChain {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    bias: Bias,
}

impl ResolutionChain {
    pub fn new(bias: Bias) -> Self {
        Self {
            strategies: Vec::new(),
            bias,
        }
    }

    /// Origin path first, then independent additions.
    pub fn standard(origin_path: &str) -> Self {
        Self::new(Bias::Incoming)
            .with(StageOrigin {
                path: origin_path.to_string(),
            })
            .with(StageAdditions)
    }

    pub fn with<S: ResolutionStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn stages(&self) -> Vec<ResolutionStage> {
        self.strategies.iter().map(|s| s.stage()).collect()
    }

    /// Run the chain against `workspace`.
    pub fn resolve<W: ConflictWorkspace>(&self, workspace: &mut W) -> Result<ChainOutcome, W::Error> {
        let mut remaining = workspace.conflicts()?;
        if remaining.is_empty() {
            return Ok(ChainOutcome::Resolved(ResolutionStage::Clean));
        }

        for strategy in &self.strategies {
            let actions = strategy.plan(&remaining, self.bias);
            let covers_all = strategy.resolves(&remaining, self.bias);
            debug!(
                stage = %strategy.stage(),
                conflicts = remaining.len(),
                actions = actions.len(),
                covers_all,
                "trying resolution stage"
            );
            for action in &actions {
                workspace.apply(action)?;
            }
            remaining = workspace.conflicts()?;
            if remaining.is_empty() {
                info!(stage = %strategy.stage(), "conflicts resolved");
                return Ok(ChainOutcome::Resolved(strategy.stage()));
            }
            if covers_all {
                warn!(
                    stage = %strategy.stage(),
                    remaining = remaining.len(),
                    "staged every planned path but conflicts remain"
                );
            }
        }

        warn!(
            remaining = remaining.len(),
            "conflicts remain after every resolution stage"
        );
        Ok(ChainOutcome::Unresolved(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictCategory;
    use git2::Oid;

    fn oid(fill: char) -> Oid {
        Oid::from_str(&fill.to_string().repeat(40)).unwrap()
    }

    fn entry(path: &str, category: ConflictCategory, ours: Option<Oid>, theirs: Option<Oid>) -> ConflictEntry {
        ConflictEntry {
            path: path.into(),
            category,
            ours,
            theirs,
        }
    }

    /// In-memory workspace: applying an action clears that path.
    #[derive(Default)]
    struct MemoryWorkspace {
        open: Vec<ConflictEntry>,
        applied: Vec<ConflictAction>,
    }

    impl ConflictWorkspace for MemoryWorkspace {
        type Error = std::convert::Infallible;

        fn conflicts(&self) -> Result<Vec<ConflictEntry>, Self::Error> {
            Ok(self.open.clone())
        }

        fn apply(&mut self, action: &ConflictAction) -> Result<(), Self::Error> {
            self.open.retain(|c| c.path != action.path());
            self.applied.push(action.clone());
            Ok(())
        }
    }

    #[test]
    fn test_no_conflicts_is_clean() {
        let mut ws = MemoryWorkspace::default();
        let outcome = ResolutionChain::standard("legacy.txt").resolve(&mut ws).unwrap();
        assert_eq!(outcome, ChainOutcome::Resolved(ResolutionStage::Clean));
        assert!(ws.applied.is_empty());
    }

    #[test]
    fn test_origin_edit_delete_resolved_by_first_stage() {
        let mut ws = MemoryWorkspace {
            open: vec![entry("legacy.txt", ConflictCategory::DeletedByUs, None, Some(oid('a')))],
            ..Default::default()
        };
        let outcome = ResolutionChain::standard("legacy.txt").resolve(&mut ws).unwrap();
        assert_eq!(outcome, ChainOutcome::Resolved(ResolutionStage::OriginStaged));
        assert_eq!(
            ws.applied,
            vec![ConflictAction::Take { path: "legacy.txt".into(), blob: oid('a') }]
        );
    }

    #[test]
    fn test_rename_split_falls_through_to_additions() {
        // rename/rename shape: source gone on both sides, each side added its own file
        let mut ws = MemoryWorkspace {
            open: vec![
                entry("legacy.txt", ConflictCategory::BothDeleted, None, None),
                entry("part1.txt", ConflictCategory::AddedByUs, Some(oid('1')), None),
                entry("part2.txt", ConflictCategory::AddedByThem, None, Some(oid('2'))),
            ],
            ..Default::default()
        };
        let outcome = ResolutionChain::standard("legacy.txt").resolve(&mut ws).unwrap();
        assert_eq!(outcome, ChainOutcome::Resolved(ResolutionStage::AdditionsStaged));
        assert_eq!(
            ws.applied,
            vec![
                ConflictAction::Remove { path: "legacy.txt".into() },
                ConflictAction::Take { path: "part1.txt".into(), blob: oid('1') },
                ConflictAction::Take { path: "part2.txt".into(), blob: oid('2') },
            ]
        );
    }

    #[test]
    fn test_sibling_additions_last_writer_wins() {
        // three siblings add shared.txt; merging them in order, each merge
        // keeps the incoming version
        let chain = ResolutionChain::standard("legacy.txt");
        let mut current = None;
        for incoming in [oid('1'), oid('2'), oid('3')] {
            let category = if current.is_some() {
                ConflictCategory::BothAdded
            } else {
                ConflictCategory::AddedByThem
            };
            let mut ws = MemoryWorkspace {
                open: vec![entry("shared.txt", category, current, Some(incoming))],
                ..Default::default()
            };
            let outcome = chain.resolve(&mut ws).unwrap();
            assert_eq!(outcome, ChainOutcome::Resolved(ResolutionStage::AdditionsStaged));
            match &ws.applied[..] {
                [ConflictAction::Take { blob, .. }] => current = Some(*blob),
                other => panic!("unexpected actions: {:?}", other),
            }
        }
        assert_eq!(current, Some(oid('3')));
    }

    #[test]
    fn test_unhandled_conflict_is_reported() {
        let stuck = entry("other.txt", ConflictCategory::BothModified, Some(oid('1')), Some(oid('2')));
        let mut ws = MemoryWorkspace {
            open: vec![stuck.clone()],
            ..Default::default()
        };
        let outcome = ResolutionChain::standard("legacy.txt").resolve(&mut ws).unwrap();
        assert_eq!(outcome, ChainOutcome::Unresolved(vec![stuck]));
    }

    #[test]
    fn test_strategies_are_pure_predictions() {
        let conflicts = vec![
            entry("legacy.txt", ConflictCategory::DeletedByUs, None, Some(oid('a'))),
            entry("new.txt", ConflictCategory::BothAdded, Some(oid('b')), Some(oid('c'))),
        ];
        let origin = StageOrigin { path: "legacy.txt".into() };
        assert!(!origin.resolves(&conflicts, Bias::Incoming));
        assert!(StageAdditions.resolves(&conflicts[1..], Bias::Incoming));
        assert_eq!(
            StageAdditions.plan(&conflicts, Bias::Current),
            vec![ConflictAction::Take { path: "new.txt".into(), blob: oid('b') }]
        );
    }

    #[test]
    fn test_standard_chain_order() {
        assert_eq!(
            ResolutionChain::standard("x").stages(),
            vec![ResolutionStage::OriginStaged, ResolutionStage::AdditionsStaged]
        );
    }
}
