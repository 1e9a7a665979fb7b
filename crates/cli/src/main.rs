//! git-split command-line tool.
//!
//! Splits one tracked file into several while keeping each line's history,
//! by committing renames and rewrites on ephemeral branches and merging
//! them back.

mod render;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gitsplit_core::config::AppConfig;
use gitsplit_core::errors::{CoreError, ExitStatus};
use gitsplit_core::validate::{prepare, SplitRequest};
use gitsplit_core::SplitEngine;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Split a tracked file into several files without losing line history.
#[derive(Parser, Debug)]
#[command(
    name = "git-split",
    version,
    about = "Split a tracked file into several files while preserving line history"
)]
struct Cli {
    /// Tracked file to split.
    source: PathBuf,

    /// Directory holding the desired final content of every split unit.
    content_dir: PathBuf,

    /// Directory the split units are moved into (created if absent).
    target_dir: PathBuf,

    /// What happens to the source name afterwards: MOVE or DELETE.
    strategy: String,

    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip both confirmation prompts.
    #[arg(short, long)]
    yes: bool,

    /// Never delete the ephemeral branches.
    #[arg(long)]
    keep_branches: bool,

    /// Print the operation plan and exit without touching the repository.
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Log each branch and merge action.
    #[arg(short, long)]
    verbose: bool,

    /// Log backend detail.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn request(&self) -> SplitRequest {
        SplitRequest {
            source: self.source.clone(),
            content_dir: self.content_dir.clone(),
            target_dir: self.target_dir.clone(),
            strategy: self.strategy.clone(),
        }
    }

    fn log_filter(&self, config: &AppConfig) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let level = if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            config.logging.level.as_str()
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Exit status for an argument-parsing failure. Help and version output
/// are not failures.
fn parse_error_status(err: &clap::Error) -> ExitStatus {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitStatus::Success,
        _ => ExitStatus::MissingArguments,
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let status = parse_error_status(&e);
            let _ = e.print();
            return status.into();
        }
    };

    let config = match AppConfig::load_and_resolve(cli.config.as_deref())
        .context("failed to load configuration")
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            return ExitStatus::Unclassified.into();
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter(&config))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(&cli, config) {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitStatus::Unclassified.into()
        }
    }
}

fn run(cli: &Cli, config: AppConfig) -> Result<ExitStatus> {
    let (git, session) = match prepare(&cli.request(), &config) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("{}", style::error(&e.to_string()));
            return Ok(e.exit_status());
        }
    };

    let mut engine = SplitEngine::new(git, session, config);
    let plan = engine.plan();
    debug!(steps = plan.len(), "built operation plan");

    if cli.dry_run {
        if cli.json {
            let steps: Vec<_> = plan.iter().collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&steps).context("failed to serialise plan")?
            );
        } else {
            render::print_session(engine.session());
            println!("{}", render::plan_table(engine.session(), &plan));
        }
        return Ok(ExitStatus::Success);
    }

    if !cli.yes {
        render::print_session(engine.session());
        let proceed = Confirm::new()
            .with_prompt(format!("Run {} steps?", plan.len()))
            .default(true)
            .interact()
            .context("failed to read confirmation")?;
        if !proceed {
            println!("{}", style::warn("Split cancelled. Nothing was changed."));
            return Ok(ExitStatus::Success);
        }
    }

    let bar = ProgressBar::new(plan.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.blue} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    if cli.json {
        bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    let result = engine.run_with(|event| {
        bar.set_position(event.position as u64 - 1);
        bar.set_message(event.description.clone());
    });
    bar.finish_and_clear();

    match result {
        Ok(report) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("failed to serialise report")?
                );
            } else {
                render::print_report(&report);
            }
            offer_cleanup(cli, &mut engine, false);
            Ok(ExitStatus::Success)
        }
        Err(e) => Ok(finish_with_error(cli, &mut engine, e)),
    }
}

/// Report a failed run, try to get back to the original branch and offer
/// cleanup. Returns the exit status for the error.
fn finish_with_error(cli: &Cli, engine: &mut SplitEngine, err: CoreError) -> ExitStatus {
    eprintln!("{}", style::error(&format!("Split failed: {}", err)));
    let report = engine.report();
    if let Some(unit) = report.units.iter().find(|u| u.merge.is_none() && u.state.is_some()) {
        eprintln!(
            "  {}",
            style::dim(&format!("first unmerged unit: {} ({})", unit.name, unit.branch))
        );
    }

    match engine.return_to_original() {
        Ok(()) => eprintln!(
            "{}",
            style::success(&format!(
                "Back on {}",
                style::branch(&engine.session().original_branch)
            ))
        ),
        Err(e) => eprintln!(
            "{}",
            style::warn(&format!("Could not return to the original branch: {}", e))
        ),
    }

    match engine.is_settled() {
        Ok(true) => {}
        Ok(false) => eprintln!(
            "{}",
            style::warn("Working tree is not clean or a merge is still in progress")
        ),
        Err(e) => eprintln!(
            "{}",
            style::warn(&format!("Could not inspect the working tree: {}", e))
        ),
    }

    offer_cleanup(cli, engine, true);
    err.exit_status()
}

/// Ask (unless `--yes`) whether to delete the ephemeral branches, then do it.
/// Failures here are reported but never change the exit status.
fn offer_cleanup(cli: &Cli, engine: &mut SplitEngine, failed: bool) {
    if cli.keep_branches {
        return;
    }
    let count = engine.topology().created_branches().len();
    if count == 0 {
        return;
    }
    let confirmed = cli.yes
        || Confirm::new()
            .with_prompt(if failed {
                format!("Abort and delete the {} ephemeral branches?", count)
            } else {
                format!("Delete the {} ephemeral branches?", count)
            })
            .default(!failed)
            .interact()
            .unwrap_or(false);
    if !confirmed {
        println!(
            "{}",
            style::dim("Ephemeral branches kept; delete them with git branch -D when done.")
        );
        return;
    }

    match engine.cleanup(true) {
        Ok(report) if !cli.json => render::print_cleanup(&report),
        Ok(_) => {}
        Err(e) => eprintln!("{}", style::warn(&format!("Cleanup incomplete: {}", e))),
    }
}
