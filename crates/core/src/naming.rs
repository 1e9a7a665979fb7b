//! Branch naming for ephemeral split branches.
//!
//! Names are pure string concatenation: the integration branch is
//! `<prefix>/<artifact>` and each unit branch is
//! `<integration><separator><unit>`. With the integration branch fixed for a
//! run, distinct unit names always yield distinct branch names.

use git2::Reference;

/// Name of the integration branch for an originating artifact.
pub fn integration_branch_name(prefix: &str, artifact_base_name: &str) -> String {
    format!("{}/{}", prefix, artifact_base_name)
}

/// Name of the branch dedicated to one split unit.
pub fn unit_branch_name(integration: &str, separator: &str, unit_base_name: &str) -> String {
    format!("{}{}{}", integration, separator, unit_base_name)
}

/// Check that `name` is usable as a local branch name.
///
/// Returns a human-readable reason on failure. Unit names come straight from
/// a directory listing, so this runs on every one of them before any branch
/// is created.
pub fn check_branch_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".into());
    }
    if let Some(c) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("contains {:?}", c));
    }
    for forbidden in ["~", "^", ":", "?", "*", "[", "\\", "..", "@{"] {
        if name.contains(forbidden) {
            return Err(format!("contains '{}'", forbidden));
        }
    }
    if !Reference::is_valid_name(&format!("refs/heads/{}", name)) {
        return Err("rejected by git ref-name rules".into());
    }
    Ok(())
}
