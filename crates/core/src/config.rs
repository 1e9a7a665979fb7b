//! Configuration for git-split.
//!
//! Every section is optional; a missing file at the default location yields
//! [`AppConfig::default`]. Values are loaded from TOML and may be overridden
//! by environment variables for the merge identity.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::naming;

/// Environment variable overriding `identity.name`.
pub const AUTHOR_NAME_ENV: &str = "GIT_SPLIT_AUTHOR_NAME";
/// Environment variable overriding `identity.email`.
pub const AUTHOR_EMAIL_ENV: &str = "GIT_SPLIT_AUTHOR_EMAIL";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fixed attribution for the synthetic merge commits.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Ephemeral branch naming.
    #[serde(default)]
    pub branches: BranchConfig,

    /// Merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Commit message templates.
    #[serde(default)]
    pub commit_format: CommitFormatConfig,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Author and committer of merge commits. Kept distinct from whoever runs the
/// tool so synthetic history is easy to tell apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,

    #[serde(default = "default_identity_email")]
    pub email: String,
}

fn default_identity_name() -> String {
    "git-split".into()
}

fn default_identity_email() -> String {
    "git-split@localhost".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            email: default_identity_email(),
        }
    }
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

/// Naming of the integration branch and per-unit branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Integration branch is `<prefix>/<artifact base name>`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Unit branch is `<integration><separator><unit base name>`.
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_prefix() -> String {
    "split".into()
}

fn default_separator() -> String {
    "__".into()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            separator: default_separator(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Let libgit2 pair deletions with additions as renames while merging.
    /// Off by default: a detected rename makes the origin unit's edit land
    /// in whichever split file git pairs it with.
    #[serde(default)]
    pub detect_renames: bool,
}

// ---------------------------------------------------------------------------
// Commit format templates
// ---------------------------------------------------------------------------

/// Commit message templates.
///
/// Placeholders: `{source}`, `{unit}`, `{path}`, `{branch}`, `{target}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFormatConfig {
    /// The pure-rename commit on a unit branch.
    #[serde(default = "default_relocate_template")]
    pub relocate: String,

    /// The content commit of the origin unit.
    #[serde(default = "default_content_origin_template")]
    pub content_origin: String,

    /// The content commit of every other unit.
    #[serde(default = "default_content_unit_template")]
    pub content_unit: String,

    /// Merge commits (unit into integration, integration into original).
    #[serde(default = "default_merge_template")]
    pub merge: String,

    /// The empty placeholder left at the source path by `MOVE` when no unit
    /// takes over the source's name.
    #[serde(default = "default_keep_source_template")]
    pub keep_source: String,
}

fn default_relocate_template() -> String {
    "split: move {source} to {path}\n\nSplit-Unit: {unit}".into()
}

fn default_content_origin_template() -> String {
    "split: remove split content from {source}\n\nSplit-Unit: {unit}".into()
}

fn default_content_unit_template() -> String {
    "split: place separated content in {path}\n\nSplit-Unit: {unit}".into()
}

fn default_merge_template() -> String {
    "split: merge {branch} into {target}".into()
}

fn default_keep_source_template() -> String {
    "split: keep an empty {source} in place".into()
}

impl Default for CommitFormatConfig {
    fn default() -> Self {
        Self {
            relocate: default_relocate_template(),
            content_origin: default_content_origin_template(),
            content_unit: default_content_unit_template(),
            merge: default_merge_template(),
            keep_source: default_keep_source_template(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Default location: `<config dir>/git-split/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("git-split").join("config.toml"))
    }

    /// Load from an explicit path, or from [`AppConfig::default_path`] when
    /// it exists, then apply environment overrides and validate.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load_and_resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => {
                    debug!("no configuration file, using defaults");
                    Self::default()
                }
            },
        };
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Apply `GIT_SPLIT_AUTHOR_*` overrides.
    pub fn resolve_env_vars(&mut self) {
        if let Some(name) = resolve_optional_env(AUTHOR_NAME_ENV, "identity.name") {
            self.identity.name = name;
        }
        if let Some(email) = resolve_optional_env(AUTHOR_EMAIL_ENV, "identity.email") {
            self.identity.email = email;
        }
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "identity.name".into(),
                detail: "merge author name must not be empty".into(),
            });
        }
        if self.identity.email.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "identity.email".into(),
                detail: "merge author email must not be empty".into(),
            });
        }
        if self.branches.prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "branches.prefix".into(),
                detail: "branch prefix must not be empty".into(),
            });
        }
        if self.branches.separator.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "branches.separator".into(),
                detail: "separator must not be empty".into(),
            });
        }
        if self.branches.separator.contains('/') {
            // `a/b` and `a/b/c` cannot both exist as refs.
            return Err(ConfigError::InvalidValue {
                field: "branches.separator".into(),
                detail: "separator must not contain '/'".into(),
            });
        }
        let sample = naming::unit_branch_name(
            &naming::integration_branch_name(&self.branches.prefix, "sample"),
            &self.branches.separator,
            "sample",
        );
        if let Err(reason) = naming::check_branch_name(&sample) {
            return Err(ConfigError::InvalidValue {
                field: "branches".into(),
                detail: format!("prefix/separator produce an invalid branch name: {reason}"),
            });
        }
        Ok(())
    }
}

/// Try to read an environment variable by name.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
[identity]
name = "Split Bot"
email = "bot@example.com"

[branches]
prefix = "carve"
separator = "--"

[merge]
detect_renames = true

[commit_format]
merge = "merge {branch} -> {target}"

[logging]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.identity.name, "Split Bot");
        assert_eq!(config.branches.prefix, "carve");
        assert_eq!(config.branches.separator, "--");
        assert!(config.merge.detect_renames);
        assert_eq!(config.commit_format.merge, "merge {branch} -> {target}");
        // untouched templates keep their defaults
        assert_eq!(
            config.commit_format.relocate,
            CommitFormatConfig::default().relocate
        );
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.identity.name, "git-split");
        assert_eq!(config.branches.prefix, "split");
        assert_eq!(config.branches.separator, "__");
        assert!(!config.merge.detect_renames);
        assert_eq!(config.logging.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, sample_toml()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load failed");
        assert_eq!(config.identity.email, "bot@example.com");
    }

    #[test]
    fn test_explicit_file_not_found() {
        let result = AppConfig::load_and_resolve(Some(Path::new("/nonexistent/git-split.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[identity\nname = ").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_identity() {
        let mut config = AppConfig::default();
        config.identity.email = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "identity.email"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_branch_parts() {
        let mut config = AppConfig::default();
        config.branches.separator = "/".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.branches.prefix = "bad..prefix".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "branches"
        ));

        let mut config = AppConfig::default();
        config.branches.prefix = String::new();
        assert!(config.validate().is_err());
    }
}
