//! Local Git repository operations via `git2`.

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, ErrorCode, FileFavor, Index, MergeOptions, Oid, Repository, RepositoryState,
    ResetType, Signature, StatusOptions,
};
use tracing::{debug, info, instrument, warn};

use crate::config::IdentityConfig;
use crate::conflict::{ConflictAction, ConflictCategory, ConflictEntry, ConflictWorkspace};
use crate::errors::GitError;

/// High-level Git client wrapping a `git2::Repository` with a working tree.
pub struct GitClient {
    repo: Repository,
    workdir: PathBuf,
}

impl std::fmt::Debug for GitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitClient")
            .field("workdir", &self.workdir)
            .finish()
    }
}

/// What a merge attempt left behind in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAttempt {
    /// Nothing to merge; the branch is already an ancestor of HEAD.
    UpToDate,
    /// Index and working tree hold the merged result, ready to commit.
    Clean { their: Oid },
    /// The index has conflict entries.
    Conflicted { their: Oid },
}

impl GitClient {
    /// Open the repository containing `path`.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::discover(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or(GitError::BareRepository)?
            .to_path_buf();
        let workdir = workdir.canonicalize().unwrap_or(workdir);
        Ok(Self { repo, workdir })
    }

    /// Canonical working tree root.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Short name of the branch HEAD points at.
    pub fn current_branch(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Err(GitError::DetachedHead);
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| GitError::RefNotFound("HEAD".into()))
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit a local branch points at.
    pub fn branch_tip(&self, name: &str) -> Result<Oid, GitError> {
        let branch = self.find_branch(name)?;
        let commit = branch.get().peel_to_commit()?;
        Ok(commit.id())
    }

    /// Create `name` at the tip of `from_branch`. Never overwrites.
    #[instrument(skip(self))]
    pub fn create_branch(&self, name: &str, from_branch: &str) -> Result<Oid, GitError> {
        let commit = self.find_branch(from_branch)?.get().peel_to_commit()?;
        self.repo.branch(name, &commit, false)?;
        info!(name, from_branch, sha = %commit.id(), "created branch");
        Ok(commit.id())
    }

    /// Force-delete a local branch. Returns `false` if it did not exist.
    #[instrument(skip(self))]
    pub fn delete_branch(&self, name: &str) -> Result<bool, GitError> {
        let mut branch = match self.repo.find_branch(name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(name, "branch already absent");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        branch.delete()?;
        info!(name, "deleted branch");
        Ok(true)
    }

    /// List all local branch names.
    pub fn list_branches(&self) -> Result<Vec<String>, GitError> {
        let branches = self.repo.branches(Some(BranchType::Local))?;
        let mut names = Vec::new();
        for branch_result in branches {
            let (branch, _) = branch_result?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Switch the working tree and HEAD to a local branch.
    #[instrument(skip(self))]
    pub fn checkout_branch(&self, name: &str) -> Result<(), GitError> {
        let branch = self.find_branch(name)?;
        let reference = branch.get();
        let refname = reference
            .name()
            .ok_or_else(|| GitError::RefNotFound(name.to_string()))?
            .to_string();
        let commit = reference.peel_to_commit()?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.repo.set_head(&refname)?;
        debug!(name, sha = %commit.id(), "checked out branch");
        Ok(())
    }

    fn find_branch(&self, name: &str) -> Result<git2::Branch<'_>, GitError> {
        self.repo
            .find_branch(name, BranchType::Local)
            .map_err(|e| match e.code() {
                ErrorCode::NotFound => GitError::RefNotFound(name.to_string()),
                _ => GitError::Git2Error(e),
            })
    }

    // -----------------------------------------------------------------------
    // Paths and the index
    // -----------------------------------------------------------------------

    /// Whether a repo-relative path has a stage-0 entry in the index.
    pub fn is_tracked(&self, rel: &Path) -> Result<bool, GitError> {
        let index = self.repo.index()?;
        Ok(index.get_path(rel, 0).is_some())
    }

    /// Content of a repo-relative path in a branch's snapshot.
    pub fn blob_at(&self, branch: &str, rel: &Path) -> Result<Option<Vec<u8>>, GitError> {
        let tree = self.find_branch(branch)?.get().peel_to_tree()?;
        let entry = match tree.get_path(rel) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = self.repo.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }

    /// Write one path's content from another branch's snapshot into the
    /// working tree and index.
    #[instrument(skip(self))]
    pub fn restore_path_from(&self, branch: &str, rel: &Path) -> Result<(), GitError> {
        let content = self
            .blob_at(branch, rel)?
            .ok_or_else(|| GitError::RefNotFound(format!("{}:{}", branch, rel.display())))?;
        self.write_file(rel, &content)?;
        self.stage_path(rel)?;
        info!(branch, path = %rel.display(), "restored path from branch snapshot");
        Ok(())
    }

    /// Rename a tracked file in the working tree and record it in the index.
    #[instrument(skip(self))]
    pub fn move_path(&self, from: &Path, to: &Path) -> Result<(), GitError> {
        let src = self.workdir.join(from);
        let dst = self.workdir.join(to);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&src, &dst)?;

        let mut index = self.repo.index()?;
        index.remove_path(from)?;
        index.add_path(to)?;
        index.write()?;
        debug!(from = %from.display(), to = %to.display(), "moved path");
        Ok(())
    }

    /// Overwrite a repo-relative file with `content`.
    pub fn write_file(&self, rel: &Path, content: &[u8]) -> Result<(), GitError> {
        let abs = self.workdir.join(rel);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&abs, content)?;
        Ok(())
    }

    /// Stage the working-tree state of one path: add it if present, record
    /// its removal otherwise. Clears any conflict entries for the path.
    pub fn stage_path(&self, rel: &Path) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        if self.workdir.join(rel).exists() {
            index.add_path(rel)?;
        } else {
            index.remove_path(rel)?;
        }
        clear_conflict(&mut index, rel)?;
        index.write()?;
        debug!(path = %rel.display(), "staged path");
        Ok(())
    }

    /// Whether HEAD differs from the index or working tree for any tracked file.
    pub fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// The invoking user's signature, or `fallback` when git has none.
    pub fn user_signature(&self, fallback: &IdentityConfig) -> Result<Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(e) => {
                warn!(error = %e, "no git user identity configured, using merge identity");
                Ok(Signature::now(&fallback.name, &fallback.email)?)
            }
        }
    }

    /// Commit the current index on top of HEAD. Empty commits are allowed.
    #[instrument(skip(self, message, sig))]
    pub fn commit_staged(&self, message: &str, sig: &Signature<'_>) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let parent = self.repo.head()?.peel_to_commit()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), sig, sig, message, &tree, &[&parent])?;
        info!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Merge a local branch into HEAD, preferring the incoming side of any
    /// conflicting hunk. Leaves the result in the index; see [`Self::commit_merge`].
    #[instrument(skip(self))]
    pub fn merge_branch(&self, name: &str, detect_renames: bool) -> Result<MergeAttempt, GitError> {
        let their = self.branch_tip(name)?;
        let annotated = self.repo.find_annotated_commit(their)?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            debug!(name, "branch already merged");
            return Ok(MergeAttempt::UpToDate);
        }

        let mut opts = MergeOptions::new();
        opts.file_favor(FileFavor::Theirs)
            .find_renames(detect_renames);
        self.repo.merge(&[&annotated], Some(&mut opts), None)?;

        let index = self.repo.index()?;
        if index.has_conflicts() {
            debug!(name, "merge left conflicts");
            Ok(MergeAttempt::Conflicted { their })
        } else {
            Ok(MergeAttempt::Clean { their })
        }
    }

    /// Record the in-progress merge as a two-parent commit and clear the
    /// merge state.
    #[instrument(skip(self, message, sig))]
    pub fn commit_merge(
        &self,
        message: &str,
        sig: &Signature<'_>,
        their: Oid,
    ) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let head = self.repo.head()?.peel_to_commit()?;
        let theirs = self.repo.find_commit(their)?;
        let oid = self
            .repo
            .commit(Some("HEAD"), sig, sig, message, &tree, &[&head, &theirs])?;
        self.repo.cleanup_state()?;
        info!(sha = %oid, "created merge commit");
        Ok(oid)
    }

    pub fn merge_in_progress(&self) -> bool {
        self.repo.state() == RepositoryState::Merge
    }

    /// Drop an in-progress merge: hard reset to HEAD and clear merge state.
    #[instrument(skip(self))]
    pub fn abort_merge(&self) -> Result<(), GitError> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.reset(head.as_object(), ResetType::Hard, None)?;
        self.repo.cleanup_state()?;
        info!(sha = %head.id(), "aborted in-progress merge");
        Ok(())
    }

    /// Conflict entries currently in the index.
    pub fn conflicts(&self) -> Result<Vec<ConflictEntry>, GitError> {
        let index = self.repo.index()?;
        if !index.has_conflicts() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let path_bytes = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref())
                .map(|entry| entry.path.clone());
            let Some(bytes) = path_bytes else { continue };
            let Some(category) = ConflictCategory::classify(
                conflict.ancestor.is_some(),
                conflict.our.is_some(),
                conflict.their.is_some(),
            ) else {
                continue;
            };
            entries.push(ConflictEntry {
                path: String::from_utf8_lossy(&bytes).to_string(),
                category,
                ours: conflict.our.as_ref().map(|e| e.id),
                theirs: conflict.their.as_ref().map(|e| e.id),
            });
        }
        Ok(entries)
    }
}

impl ConflictWorkspace for GitClient {
    type Error = GitError;

    fn conflicts(&self) -> Result<Vec<ConflictEntry>, GitError> {
        GitClient::conflicts(self)
    }

    fn apply(&mut self, action: &ConflictAction) -> Result<(), GitError> {
        match action {
            ConflictAction::Take { path, blob } => {
                let content = self.repo.find_blob(*blob)?.content().to_vec();
                let rel = Path::new(path);
                self.write_file(rel, &content)?;
                self.stage_path(rel)
            }
            ConflictAction::Remove { path } => {
                let rel = Path::new(path);
                let abs = self.workdir.join(rel);
                if abs.exists() {
                    std::fs::remove_file(&abs)?;
                }
                self.stage_path(rel)
            }
        }
    }
}

/// Drop any conflict stages (1 to 3) left for `rel`.
fn clear_conflict(index: &mut Index, rel: &Path) -> Result<(), GitError> {
    for stage in 1..=3 {
        match index.remove(rel, stage) {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
