//! Precondition checks. Everything here runs before any branch exists, so a
//! failure leaves the repository untouched.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::errors::{GitError, ValidationError};
use crate::git::GitClient;
use crate::models::{SplitSession, SplitUnit, Strategy};
use crate::naming;

/// Raw inputs, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SplitRequest {
    pub source: PathBuf,
    pub content_dir: PathBuf,
    pub target_dir: PathBuf,
    pub strategy: String,
}

/// Check `request` and build the session for the run.
///
/// Checks run in exit-code order: missing arguments, source existence,
/// source tracking, content directory, strategy, then the derived branch
/// names and a clean working tree.
pub fn prepare(
    request: &SplitRequest,
    config: &AppConfig,
) -> Result<(GitClient, SplitSession), ValidationError> {
    let missing: Vec<&str> = [
        ("SOURCE", request.source.as_os_str().is_empty()),
        ("CONTENT_DIR", request.content_dir.as_os_str().is_empty()),
        ("TARGET_DIR", request.target_dir.as_os_str().is_empty()),
        ("STRATEGY", request.strategy.trim().is_empty()),
    ]
    .into_iter()
    .filter(|(_, empty)| *empty)
    .map(|(name, _)| name)
    .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingArguments(missing.join(", ")));
    }

    if !request.source.is_file() {
        return Err(ValidationError::SourceMissing(request.source.clone()));
    }
    let source_abs = request
        .source
        .canonicalize()
        .map_err(|e| ValidationError::GitError(GitError::IoError(e)))?;
    let search_from = source_abs.parent().unwrap_or(source_abs.as_path());
    let git = match GitClient::discover(search_from) {
        Ok(git) => git,
        Err(GitError::RepositoryNotFound(_)) => {
            return Err(ValidationError::SourceUntracked(request.source.clone()));
        }
        Err(e) => return Err(e.into()),
    };
    let source = source_abs
        .strip_prefix(git.workdir())
        .map_err(|_| ValidationError::NotInWorkTree(request.source.clone()))?
        .to_path_buf();
    if !git.is_tracked(&source)? {
        return Err(ValidationError::SourceUntracked(request.source.clone()));
    }

    if !request.content_dir.exists() {
        return Err(ValidationError::ContentDirMissing(request.content_dir.clone()));
    }
    if !request.content_dir.is_dir() {
        return Err(ValidationError::ContentDirNotDirectory(
            request.content_dir.clone(),
        ));
    }

    let strategy: Strategy = request.strategy.parse()?;

    let target_dir = relative_to_workdir(&request.target_dir, git.workdir())
        .ok_or_else(|| ValidationError::NotInWorkTree(request.target_dir.clone()))?;

    let source_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ValidationError::SourceMissing(request.source.clone()))?;
    let integration_branch =
        naming::integration_branch_name(&config.branches.prefix, &source_name);
    check_name(&source_name, &integration_branch)?;

    let original_branch = git.current_branch()?;
    let units = list_units(
        &request.content_dir,
        &source,
        &source_name,
        &target_dir,
        &integration_branch,
        &config.branches.separator,
    )?;
    if units.is_empty() {
        warn!(dir = %request.content_dir.display(), "content directory is empty");
    }

    if git.has_uncommitted_changes()? {
        return Err(ValidationError::DirtyWorkTree);
    }

    info!(
        source = %source.display(),
        original = %original_branch,
        integration = %integration_branch,
        units = units.len(),
        %strategy,
        "validated split request"
    );

    let session = SplitSession {
        repo_root: git.workdir().to_path_buf(),
        original_branch,
        source,
        source_name,
        integration_branch,
        content_dir: request.content_dir.clone(),
        target_dir,
        strategy,
        units,
    };
    Ok((git, session))
}

fn check_name(name: &str, branch: &str) -> Result<(), ValidationError> {
    naming::check_branch_name(branch).map_err(|reason| ValidationError::InvalidBranchName {
        name: name.to_string(),
        reason,
    })
}

/// Read the content directory into units, sorted by name.
fn list_units(
    content_dir: &Path,
    source: &Path,
    source_name: &str,
    target_dir: &Path,
    integration_branch: &str,
    separator: &str,
) -> Result<Vec<SplitUnit>, ValidationError> {
    let io = |e: std::io::Error| ValidationError::GitError(GitError::IoError(e));

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(content_dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let path = entry.path();
        if !path.is_file() {
            debug!(path = %path.display(), "skipping non-file entry");
            continue;
        }
        entries.push((entry.file_name().to_string_lossy().into_owned(), path));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut units = Vec::with_capacity(entries.len());
    for (name, path) in entries {
        let branch = naming::unit_branch_name(integration_branch, separator, &name);
        check_name(&name, &branch)?;
        let is_origin = name == source_name;
        let unit_path = if is_origin {
            source.to_path_buf()
        } else {
            target_dir.join(&name)
        };
        let content = std::fs::read(&path).map_err(io)?;
        debug!(unit = %name, bytes = content.len(), origin = is_origin, "discovered unit");
        units.push(SplitUnit {
            name,
            branch,
            path: unit_path,
            content,
            is_origin,
        });
    }
    Ok(units)
}

/// `path` relative to `workdir`, for a path that may not exist yet.
///
/// The longest existing ancestor is canonicalised; the rest is appended
/// as-is and may not contain `..`.
fn relative_to_workdir(path: &Path, workdir: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        rest.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }
    let mut resolved = existing.canonicalize().ok()?;
    for part in rest.into_iter().rev() {
        if Path::new(&part)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        resolved.push(part);
    }
    resolved.strip_prefix(workdir).ok().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};

    fn repo_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut index = repo.index().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("T", "t@t.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
        dir
    }

    fn request(dir: &Path, content: &Path, strategy: &str) -> SplitRequest {
        SplitRequest {
            source: dir.join("legacy.txt"),
            content_dir: content.to_path_buf(),
            target_dir: dir.to_path_buf(),
            strategy: strategy.into(),
        }
    }

    fn exit_code(result: Result<(GitClient, SplitSession), ValidationError>) -> u8 {
        match result {
            Ok(_) => 0,
            Err(e) => e.exit_status().code(),
        }
    }

    #[test]
    fn test_missing_arguments() {
        let err = prepare(&SplitRequest::default(), &AppConfig::default()).unwrap_err();
        assert_eq!(err.exit_status().code(), 65);
        assert!(err.to_string().contains("SOURCE"));
    }

    #[test]
    fn test_exit_codes_for_bad_paths() {
        let repo = repo_with(&[("legacy.txt", "A\nB\nC\n")]);
        let parts = tempfile::tempdir().unwrap();
        let config = AppConfig::default();

        let mut req = request(repo.path(), parts.path(), "MOVE");
        req.source = repo.path().join("nope.txt");
        assert_eq!(exit_code(prepare(&req, &config)), 66);

        std::fs::write(repo.path().join("untracked.txt"), "x").unwrap();
        req.source = repo.path().join("untracked.txt");
        assert_eq!(exit_code(prepare(&req, &config)), 67);

        let mut req = request(repo.path(), &parts.path().join("missing"), "MOVE");
        assert_eq!(exit_code(prepare(&req, &config)), 68);

        let file = parts.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        req.content_dir = file;
        assert_eq!(exit_code(prepare(&req, &config)), 69);

        let req = request(repo.path(), parts.path(), "COPY");
        assert_eq!(exit_code(prepare(&req, &config)), 71);
    }

    #[test]
    fn test_source_outside_any_repo_is_untracked() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("legacy.txt"), "A\n").unwrap();
        let parts = tempfile::tempdir().unwrap();
        let req = request(outside.path(), parts.path(), "MOVE");
        assert_eq!(exit_code(prepare(&req, &AppConfig::default())), 67);
    }

    #[test]
    fn test_builds_session_with_sorted_units() {
        let repo = repo_with(&[("legacy.txt", "A\nB\nC\n")]);
        let parts = tempfile::tempdir().unwrap();
        std::fs::write(parts.path().join("part2.txt"), "B\nC\n").unwrap();
        std::fs::write(parts.path().join("legacy.txt"), "").unwrap();
        std::fs::write(parts.path().join("part1.txt"), "A\n").unwrap();
        std::fs::create_dir(parts.path().join("nested")).unwrap();

        let mut req = request(repo.path(), parts.path(), "delete");
        req.target_dir = repo.path().join("split-out");
        let (_git, session) = prepare(&req, &AppConfig::default()).unwrap();

        assert_eq!(session.strategy, Strategy::Delete);
        assert_eq!(session.integration_branch, "split/legacy.txt");
        assert_eq!(session.source, PathBuf::from("legacy.txt"));
        assert_eq!(session.target_dir, PathBuf::from("split-out"));
        let names: Vec<&str> = session.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["legacy.txt", "part1.txt", "part2.txt"]);
        assert_eq!(session.units[1].branch, "split/legacy.txt__part1.txt");
        assert_eq!(session.units[1].path, PathBuf::from("split-out/part1.txt"));
        assert_eq!(session.units[2].content, b"B\nC\n");
        assert!(session.units[0].is_origin);
        assert_eq!(session.units[0].path, PathBuf::from("legacy.txt"));
        // nothing was created on disk
        assert!(!repo.path().join("split-out").exists());
    }

    #[test]
    fn test_rejects_unit_names_illegal_in_branches() {
        let repo = repo_with(&[("legacy.txt", "A\n")]);
        let parts = tempfile::tempdir().unwrap();
        std::fs::write(parts.path().join("bad name.txt"), "A\n").unwrap();
        let req = request(repo.path(), parts.path(), "MOVE");
        let err = prepare(&req, &AppConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidBranchName { ref name, .. } if name == "bad name.txt"));
        assert_eq!(err.exit_status().code(), 64);
    }

    #[test]
    fn test_rejects_dirty_work_tree() {
        let repo = repo_with(&[("legacy.txt", "A\n")]);
        std::fs::write(repo.path().join("legacy.txt"), "changed\n").unwrap();
        let parts = tempfile::tempdir().unwrap();
        let req = request(repo.path(), parts.path(), "MOVE");
        assert!(matches!(
            prepare(&req, &AppConfig::default()),
            Err(ValidationError::DirtyWorkTree)
        ));
    }

    #[test]
    fn test_target_outside_repo_rejected() {
        let repo = repo_with(&[("legacy.txt", "A\n")]);
        let parts = tempfile::tempdir().unwrap();
        let mut req = request(repo.path(), parts.path(), "MOVE");
        req.target_dir = parts.path().join("elsewhere");
        assert!(matches!(
            prepare(&req, &AppConfig::default()),
            Err(ValidationError::NotInWorkTree(_))
        ));
    }
}
