//! Tables and summaries for plans, reports and cleanup.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use gitsplit_core::cleanup::CleanupReport;
use gitsplit_core::models::{SplitReport, SplitSession};
use gitsplit_core::plan::SplitPlan;

use crate::style;

/// One row per queued step.
pub fn plan_table(session: &SplitSession, plan: &SplitPlan) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Step", "Action"]);
    for (i, step) in plan.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(step.to_string()),
            Cell::new(step.describe(session)),
        ]);
    }
    table
}

/// Short description of what is about to happen, shown before confirming.
pub fn print_session(session: &SplitSession) {
    println!();
    println!("{}", style::header("Split"));
    println!("  Source        : {}", session.source.display());
    println!("  Strategy      : {}", session.strategy);
    println!("  Original      : {}", style::branch(&session.original_branch));
    println!("  Integration   : {}", style::branch(&session.integration_branch));
    let target = session.target_dir.display().to_string();
    println!(
        "  Target dir    : {}",
        if target.is_empty() { "." } else { target.as_str() }
    );
    println!("  Units         : {}", session.units.len());
    for unit in &session.units {
        let origin = if unit.is_origin { " (origin)" } else { "" };
        println!(
            "    {} -> {}{}",
            unit.name,
            unit.path.display(),
            style::dim(origin)
        );
    }
    println!();
}

pub fn report_table(report: &SplitReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Unit", "Branch", "Path", "State", "Merge"]);
    for unit in &report.units {
        let state = unit
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "—".to_string());
        let merge = unit
            .merge
            .as_ref()
            .map(|m| style::resolution(m.resolution))
            .unwrap_or_else(|| "—".to_string());
        let name = if unit.origin {
            format!("{} (origin)", unit.name)
        } else {
            unit.name.clone()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(&unit.branch),
            Cell::new(unit.path.display()),
            Cell::new(state),
            Cell::new(merge),
        ]);
    }
    table
}

pub fn print_report(report: &SplitReport) {
    println!();
    println!("{}", style::header("Split complete"));
    println!();
    println!("{}", report_table(report));
    if let Some(merge) = &report.integration_merge {
        let commit = merge
            .commit
            .as_deref()
            .map(|c| &c[..c.len().min(10)])
            .unwrap_or("none");
        println!(
            "  {} merged into {} ({}, commit {})",
            style::branch(&merge.branch),
            style::branch(&merge.into),
            style::resolution(merge.resolution),
            commit
        );
    }
    if let Some(done) = report.completed_at {
        let elapsed = done - report.started_at;
        println!(
            "  {}",
            style::dim(&format!("took {} ms", elapsed.num_milliseconds()))
        );
    }
    println!();
}

pub fn print_cleanup(report: &CleanupReport) {
    if report.aborted_merge {
        println!("{}", style::warn("Aborted the in-progress merge"));
    }
    if report.restored_original {
        println!("{}", style::success("Checked out the original branch"));
    }
    for branch in &report.deleted {
        println!("{}", style::success(&format!("Deleted {}", style::branch(branch))));
    }
    if !report.absent.is_empty() {
        println!(
            "{}",
            style::dim(&format!("{} branch(es) were already gone", report.absent.len()))
        );
    }
    for branch in &report.skipped {
        println!(
            "{}",
            style::warn(&format!("Kept {} (checked out)", style::branch(branch)))
        );
    }
}
