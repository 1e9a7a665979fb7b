//! The operation queue for one run.
//!
//! A run is fully described by an ordered list of [`Step`]s built up front
//! from the session. The engine pops them one at a time; `--dry-run` prints
//! them instead.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::merge::merge_order;
use crate::models::SplitSession;

/// A branch a step refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchRef {
    Original,
    Integration,
    Unit(usize),
}

impl BranchRef {
    pub fn resolve<'s>(&self, session: &'s SplitSession) -> Option<&'s str> {
        match self {
            Self::Original => Some(&session.original_branch),
            Self::Integration => Some(&session.integration_branch),
            Self::Unit(i) => session.unit(*i).map(|u| u.branch.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step", content = "target")]
pub enum Step {
    CreateIntegrationBranch,
    CreateUnitBranch(usize),
    Checkout(BranchRef),
    Relocate(usize),
    WriteContent(usize),
    MergeUnit(usize),
    ApplyStrategy,
    MergeIntegration,
}

impl Step {
    /// Human-readable description against a session.
    pub fn describe(&self, session: &SplitSession) -> String {
        let unit = |i: &usize| {
            session
                .unit(*i)
                .map(|u| u.name.clone())
                .unwrap_or_else(|| format!("#{}", i))
        };
        let branch = |r: &BranchRef| r.resolve(session).unwrap_or("?").to_string();
        match self {
            Self::CreateIntegrationBranch => format!(
                "create {} from {}",
                session.integration_branch, session.original_branch
            ),
            Self::CreateUnitBranch(i) => format!(
                "create {} from {}",
                branch(&BranchRef::Unit(*i)),
                session.integration_branch
            ),
            Self::Checkout(r) => format!("checkout {}", branch(r)),
            Self::Relocate(i) => match session.unit(*i) {
                Some(u) if u.is_origin => format!("keep {} in place", session.source.display()),
                Some(u) => format!(
                    "move {} to {}",
                    session.source.display(),
                    u.path.display()
                ),
                None => format!("relocate {}", unit(i)),
            },
            Self::WriteContent(i) => format!("write content of {}", unit(i)),
            Self::MergeUnit(i) => format!(
                "merge {} into {}",
                branch(&BranchRef::Unit(*i)),
                session.integration_branch
            ),
            Self::ApplyStrategy => format!("apply {} to {}", session.strategy, session.source.display()),
            Self::MergeIntegration => format!(
                "merge {} into {}",
                session.integration_branch, session.original_branch
            ),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateIntegrationBranch => write!(f, "create-integration"),
            Self::CreateUnitBranch(_) => write!(f, "create-unit"),
            Self::Checkout(_) => write!(f, "checkout"),
            Self::Relocate(_) => write!(f, "relocate"),
            Self::WriteContent(_) => write!(f, "write-content"),
            Self::MergeUnit(_) => write!(f, "merge-unit"),
            Self::ApplyStrategy => write!(f, "apply-strategy"),
            Self::MergeIntegration => write!(f, "merge-integration"),
        }
    }
}

/// Ordered steps for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    steps: VecDeque<Step>,
}

impl SplitPlan {
    pub fn build(session: &SplitSession) -> Self {
        let mut steps = VecDeque::new();
        steps.push_back(Step::CreateIntegrationBranch);
        for i in 0..session.units.len() {
            steps.push_back(Step::CreateUnitBranch(i));
            steps.push_back(Step::Checkout(BranchRef::Unit(i)));
            steps.push_back(Step::Relocate(i));
            steps.push_back(Step::WriteContent(i));
        }
        steps.push_back(Step::Checkout(BranchRef::Integration));
        for i in merge_order(session) {
            steps.push_back(Step::MergeUnit(i));
        }
        steps.push_back(Step::ApplyStrategy);
        steps.push_back(Step::Checkout(BranchRef::Original));
        steps.push_back(Step::MergeIntegration);
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn into_queue(self) -> VecDeque<Step> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SplitUnit, Strategy};
    use std::path::PathBuf;

    fn session(names: &[&str]) -> SplitSession {
        SplitSession {
            repo_root: PathBuf::from("/repo"),
            original_branch: "main".into(),
            source: PathBuf::from("legacy.txt"),
            source_name: "legacy.txt".into(),
            integration_branch: "split/legacy.txt".into(),
            content_dir: PathBuf::from("/tmp/parts"),
            target_dir: PathBuf::from("parts"),
            strategy: Strategy::Delete,
            units: names
                .iter()
                .map(|n| SplitUnit {
                    name: n.to_string(),
                    branch: format!("split/legacy.txt__{}", n),
                    path: if *n == "legacy.txt" {
                        PathBuf::from(n)
                    } else {
                        PathBuf::from("parts").join(n)
                    },
                    content: Vec::new(),
                    is_origin: *n == "legacy.txt",
                })
                .collect(),
        }
    }

    fn position(plan: &SplitPlan, step: Step) -> usize {
        plan.iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn test_plan_shape() {
        let plan = SplitPlan::build(&session(&["part1.txt", "part2.txt"]));
        let steps: Vec<Step> = plan.into_queue().into_iter().collect();
        assert_eq!(
            steps,
            vec![
                Step::CreateIntegrationBranch,
                Step::CreateUnitBranch(0),
                Step::Checkout(BranchRef::Unit(0)),
                Step::Relocate(0),
                Step::WriteContent(0),
                Step::CreateUnitBranch(1),
                Step::Checkout(BranchRef::Unit(1)),
                Step::Relocate(1),
                Step::WriteContent(1),
                Step::Checkout(BranchRef::Integration),
                Step::MergeUnit(0),
                Step::MergeUnit(1),
                Step::ApplyStrategy,
                Step::Checkout(BranchRef::Original),
                Step::MergeIntegration,
            ]
        );
    }

    #[test]
    fn test_origin_unit_merged_after_every_other_unit() {
        let s = session(&["a.txt", "legacy.txt", "z.txt"]);
        let plan = SplitPlan::build(&s);
        let origin = position(&plan, Step::MergeUnit(1));
        assert!(position(&plan, Step::MergeUnit(0)) < origin);
        assert!(position(&plan, Step::MergeUnit(2)) < origin);
        assert!(origin < position(&plan, Step::ApplyStrategy));
    }

    #[test]
    fn test_integration_merged_after_all_units() {
        let s = session(&["a.txt", "legacy.txt"]);
        let plan = SplitPlan::build(&s);
        let integration = position(&plan, Step::MergeIntegration);
        assert_eq!(integration, plan.len() - 1);
        for i in 0..s.units.len() {
            assert!(position(&plan, Step::MergeUnit(i)) < integration);
        }
        assert!(position(&plan, Step::Checkout(BranchRef::Original)) < integration);
    }

    #[test]
    fn test_every_unit_processed_before_merging() {
        let s = session(&["a.txt", "b.txt"]);
        let plan = SplitPlan::build(&s);
        let first_merge = position(&plan, Step::MergeUnit(0));
        for i in 0..s.units.len() {
            assert!(position(&plan, Step::WriteContent(i)) < first_merge);
            assert!(position(&plan, Step::CreateUnitBranch(i)) < position(&plan, Step::Relocate(i)));
        }
    }

    #[test]
    fn test_empty_content_dir_plan() {
        let plan = SplitPlan::build(&session(&[]));
        assert_eq!(plan.len(), 5);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_describe() {
        let s = session(&["part1.txt", "legacy.txt"]);
        assert_eq!(
            Step::Relocate(0).describe(&s),
            "move legacy.txt to parts/part1.txt"
        );
        assert_eq!(Step::Relocate(1).describe(&s), "keep legacy.txt in place");
        assert_eq!(
            Step::MergeIntegration.describe(&s),
            "merge split/legacy.txt into main"
        );
        assert_eq!(Step::ApplyStrategy.describe(&s), "apply DELETE to legacy.txt");
        assert_eq!(Step::MergeUnit(0).to_string(), "merge-unit");
    }
}
