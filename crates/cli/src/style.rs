//! Shared styling utilities for terminal output.

use console::Style;

use gitsplit_core::conflict::ResolutionStage;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold).
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Branch names stand out in cyan.
pub fn branch(name: &str) -> String {
    Style::new().cyan().apply_to(name).to_string()
}

/// Label for how a merge was settled: green when git merged cleanly,
/// yellow when the fallback chain had to step in.
pub fn resolution(stage: ResolutionStage) -> String {
    let style = match stage {
        ResolutionStage::Clean | ResolutionStage::UpToDate => Style::new().green(),
        ResolutionStage::OriginStaged | ResolutionStage::AdditionsStaged => Style::new().yellow(),
        ResolutionStage::Skipped => Style::new().dim(),
    };
    style.apply_to(stage.to_string()).to_string()
}
