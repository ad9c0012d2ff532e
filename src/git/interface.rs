//! git::interface
//!
//! Read-only repository access using git2.
//!
//! Everything the reconciler needs to *observe* flows through [`Git`]:
//! HEAD, refs, working tree status, ancestry, in-progress operations.
//! Mutations never happen here; they go through the
//! [`GitRunner`](super::runner::GitRunner) collaborator so that every
//! change is a single, reportable git invocation.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git work tree
//! - [`GitError::BareRepo`]: Repository has no work tree
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::Internal`]: Anything else git2 reports
//!
//! # Example
//!
//! ```ignore
//! use gitensure::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! println!("HEAD: {}", git.current_ref()?);
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from Git read operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Invalid object id or name coming back from git2.
    #[error("invalid git data: {0}")]
    Invalid(#[from] TypeError),

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with the ref or object involved.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CurrentRef {
    /// HEAD is a branch with at least one commit.
    Branch(BranchName),
    /// HEAD points directly at a commit.
    Detached(Oid),
    /// HEAD names a branch that has no commits yet (empty repository).
    Unborn(BranchName),
}

impl CurrentRef {
    /// The branch HEAD names, if any (including an unborn one).
    pub fn branch(&self) -> Option<&BranchName> {
        match self {
            CurrentRef::Branch(b) | CurrentRef::Unborn(b) => Some(b),
            CurrentRef::Detached(_) => None,
        }
    }

    /// Whether HEAD is on `branch`.
    pub fn is_on(&self, branch: &BranchName) -> bool {
        self.branch() == Some(branch)
    }
}

impl std::fmt::Display for CurrentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrentRef::Branch(b) => write!(f, "{}", b),
            CurrentRef::Detached(oid) => write!(f, "{} (detached)", oid.short(12)),
            CurrentRef::Unborn(b) => write!(f, "{} (no commits)", b),
        }
    }
}

/// State of in-progress Git operations.
///
/// A repository left mid-rebase by a conflict reports `Rebase` here until a
/// human continues or aborts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GitState {
    /// No operation in progress.
    Clean,

    /// Rebase in progress.
    Rebase {
        /// Current step in the rebase (1-indexed), if available.
        current: Option<usize>,
        /// Total steps in the rebase, if available.
        total: Option<usize>,
    },

    /// Merge in progress.
    Merge,

    /// Cherry-pick in progress.
    CherryPick,

    /// Revert in progress.
    Revert,

    /// Bisect in progress.
    Bisect,

    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// ```
    /// use gitensure::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase { .. } => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitState::Rebase {
                current: Some(c),
                total: Some(t),
            } => write!(f, "rebase ({}/{})", c, t),
            _ => write!(f, "{}", self.description()),
        }
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked, non-ignored files
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// No staged, unstaged, or conflicted entries. Untracked files are ignored.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Whether there is anything a commit would record.
    ///
    /// Untracked files count only when `include_untracked` is set, since
    /// the commit action stages them with `add --all` in that case.
    pub fn is_dirty(&self, include_untracked: bool) -> bool {
        !self.is_clean() || (include_untracked && self.untracked > 0)
    }
}

/// The read-only Git interface.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open the repository containing `path`.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the work tree.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Path to the work tree root.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    /// Path to the .git directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => {
                let (current, total) = self.read_rebase_progress();
                GitState::Rebase { current, total }
            }
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Read rebase progress from .git/rebase-merge or .git/rebase-apply.
    fn read_rebase_progress(&self) -> (Option<usize>, Option<usize>) {
        let read_number = |path: PathBuf| {
            std::fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse().ok())
        };

        let git_dir = self.repo.path();
        let rebase_merge = git_dir.join("rebase-merge");
        if rebase_merge.exists() {
            return (
                read_number(rebase_merge.join("msgnum")),
                read_number(rebase_merge.join("end")),
            );
        }
        let rebase_apply = git_dir.join("rebase-apply");
        if rebase_apply.exists() {
            return (
                read_number(rebase_apply.join("next")),
                read_number(rebase_apply.join("last")),
            );
        }
        (None, None)
    }

    /// Paths with unresolved conflicts in the index, sorted.
    pub fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let index = self.repo.index()?;
        if !index.has_conflicts() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());
            if let Some(entry) = entry {
                paths.push(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    // =========================================================================
    // Working Tree Status
    // =========================================================================

    /// Get working tree status summary.
    ///
    /// If `include_untracked` is false, untracked files are not counted.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    /// Number of entries on the stash stack.
    pub fn stash_depth(&self) -> Result<usize, GitError> {
        match self.repo.reflog("refs/stash") {
            Ok(reflog) => Ok(reflog.len()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .find_reference(refname)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(Oid::new(commit.id().to_string())?)
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Where HEAD points.
    pub fn current_ref(&self) -> Result<CurrentRef, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let target = self
                    .repo
                    .find_reference("HEAD")?
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(str::to_string)
                    .ok_or_else(|| GitError::Internal {
                        message: "HEAD is unborn but not symbolic".to_string(),
                    })?;
                return Ok(CurrentRef::Unborn(BranchName::new(target)?));
            }
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(CurrentRef::Branch(BranchName::new(name)?));
            }
        }
        Ok(CurrentRef::Detached(Oid::new(oid.to_string())?))
    }

    /// HEAD commit, or `None` in an empty repository.
    pub fn head_oid(&self) -> Result<Option<Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => {
                let oid = head
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?
                    .id();
                Ok(Some(Oid::new(oid.to_string())?))
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    /// Configured remote names.
    pub fn remote_names(&self) -> Result<Vec<String>, GitError> {
        let remotes = self.repo.remotes()?;
        Ok(remotes.iter().flatten().map(str::to_string).collect())
    }

    /// Short name of the upstream configured for a local branch
    /// (`origin/main`), or `None` if it has none.
    pub fn upstream_of(&self, branch: &BranchName) -> Result<Option<String>, GitError> {
        let local = match self
            .repo
            .find_branch(branch.as_str(), git2::BranchType::Local)
        {
            Ok(b) => b,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match local.upstream() {
            Ok(upstream) => Ok(upstream.name()?.map(str::to_string)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Count commits reachable from `tip` but not from `hide`.
    ///
    /// With no `hide`, counts every commit reachable from `tip`.
    pub fn count_commits(&self, tip: &Oid, hide: Option<&Oid>) -> Result<usize, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(to_git2(tip)?)?;
        if let Some(hide) = hide {
            revwalk.hide(to_git2(hide)?)?;
        }
        Ok(revwalk.count())
    }
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod git_error {
        use super::*;

        #[test]
        fn display_formatting() {
            let err = GitError::RefNotFound {
                refname: "refs/remotes/origin/prod".to_string(),
            };
            assert!(err.to_string().contains("refs/remotes/origin/prod"));

            let err = GitError::NotARepo {
                path: PathBuf::from("/tmp/nowhere"),
            };
            assert!(err.to_string().contains("/tmp/nowhere"));
        }
    }

    mod current_ref {
        use super::*;

        #[test]
        fn branch_accessors() {
            let main = BranchName::new("main").unwrap();
            let other = BranchName::new("other").unwrap();

            assert!(CurrentRef::Branch(main.clone()).is_on(&main));
            assert!(CurrentRef::Unborn(main.clone()).is_on(&main));
            assert!(!CurrentRef::Branch(main.clone()).is_on(&other));

            let detached =
                CurrentRef::Detached(Oid::new("abc123def4567890abc123def4567890abc12345").unwrap());
            assert!(detached.branch().is_none());
            assert!(detached.to_string().contains("detached"));
        }
    }

    mod git_state {
        use super::*;

        #[test]
        fn clean_is_not_in_progress() {
            assert!(!GitState::Clean.is_in_progress());
        }

        #[test]
        fn operations_are_in_progress() {
            assert!(GitState::Merge.is_in_progress());
            assert!(GitState::CherryPick.is_in_progress());
            assert!(GitState::Rebase {
                current: None,
                total: None
            }
            .is_in_progress());
        }

        #[test]
        fn display_formatting() {
            assert_eq!(format!("{}", GitState::Clean), "clean");
            assert_eq!(
                format!(
                    "{}",
                    GitState::Rebase {
                        current: Some(2),
                        total: Some(5)
                    }
                ),
                "rebase (2/5)"
            );
            assert_eq!(
                format!(
                    "{}",
                    GitState::Rebase {
                        current: None,
                        total: Some(5)
                    }
                ),
                "rebase"
            );
        }
    }

    mod worktree_status {
        use super::*;

        #[test]
        fn default_is_clean() {
            let status = WorktreeStatus::default();
            assert!(status.is_clean());
            assert!(!status.is_dirty(true));
        }

        #[test]
        fn staged_or_unstaged_is_dirty() {
            let staged = WorktreeStatus {
                staged: 1,
                ..Default::default()
            };
            let unstaged = WorktreeStatus {
                unstaged: 2,
                ..Default::default()
            };
            assert!(staged.is_dirty(false));
            assert!(unstaged.is_dirty(false));
        }

        #[test]
        fn untracked_depends_on_setting() {
            let status = WorktreeStatus {
                untracked: 3,
                ..Default::default()
            };
            assert!(status.is_clean());
            assert!(status.is_dirty(true));
            assert!(!status.is_dirty(false));
        }

        #[test]
        fn conflicts_make_dirty() {
            let status = WorktreeStatus {
                has_conflicts: true,
                ..Default::default()
            };
            assert!(status.is_dirty(false));
        }
    }
}
