//! Commit message formatting for the synthetic split history.

use std::path::Path;

use crate::config::CommitFormatConfig;
use crate::models::SplitUnit;

/// Formats commit messages from configurable templates.
pub struct CommitFormatter {
    relocate: String,
    content_origin: String,
    content_unit: String,
    merge: String,
    keep_source: String,
}

impl CommitFormatter {
    pub fn new(config: &CommitFormatConfig) -> Self {
        Self {
            relocate: config.relocate.clone(),
            content_origin: config.content_origin.clone(),
            content_unit: config.content_unit.clone(),
            merge: config.merge.clone(),
            keep_source: config.keep_source.clone(),
        }
    }

    /// Message for the pure-rename commit of a unit.
    pub fn format_relocate(&self, source: &Path, unit: &SplitUnit) -> String {
        fill(&self.relocate, source, unit)
    }

    /// Message for a unit's content commit; the origin unit gets its own wording.
    pub fn format_content(&self, source: &Path, unit: &SplitUnit) -> String {
        let template = if unit.is_origin {
            &self.content_origin
        } else {
            &self.content_unit
        };
        fill(template, source, unit)
    }

    pub fn format_merge(&self, branch: &str, target: &str) -> String {
        self.merge
            .replace("{branch}", branch)
            .replace("{target}", target)
    }

    /// Message for the empty file `MOVE` leaves at the source path.
    pub fn format_keep_source(&self, source: &Path) -> String {
        self.keep_source
            .replace("{source}", &source.display().to_string())
    }
}

fn fill(template: &str, source: &Path, unit: &SplitUnit) -> String {
    template
        .replace("{source}", &source.display().to_string())
        .replace("{unit}", &unit.name)
        .replace("{path}", &unit.path.display().to_string())
        .replace("{branch}", &unit.branch)
}
