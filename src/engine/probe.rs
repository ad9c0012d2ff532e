//! engine::probe
//!
//! Observe the repository: produce a [`RepositoryState`] snapshot.
//!
//! # Architecture
//!
//! The probe is the only engine component that reads the repository. It
//! opens the repository afresh on every call so that a snapshot taken after
//! a mutating action never reflects cached data from before it.
//!
//! The [`StateProbe`] trait is the seam the executor re-probes through;
//! [`RepositoryProbe`] is the real implementation.
//!
//! # Ref classification
//!
//! Descriptor refs are written as `remote/branch` or `branch`:
//!
//! | Written          | `pull.from`                     | `push.to`                        |
//! |------------------|---------------------------------|----------------------------------|
//! | `origin/prod`    | `refs/remotes/origin/prod`      | `prod` on remote `origin`        |
//! | `prod`           | `refs/heads/prod`               | `prod` on the default remote     |
//!
//! A prefix only counts as a remote if it names a configured remote.
//!
//! # Invariants
//!
//! - Never mutates the repository
//! - Divergence counts are symmetric-difference commit counts
//! - A missing push destination is not an error (a first push creates it)
//! - A missing remote-tracking pull source is not an error either: it is
//!   reported with `exists: false` so that ensure fetches it

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::config::Config;
use crate::core::descriptor::Descriptor;
use crate::core::types::{BranchName, Oid, RefName, RefTarget, TypeError};
use crate::git::{CurrentRef, Git, GitError, GitState};

/// Errors from probing.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The path is not inside a git work tree.
    #[error("not a git working tree: {path}")]
    RepositoryNotFound { path: PathBuf },

    /// A ref the descriptor names exists neither locally nor remotely.
    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    /// A descriptor ref cannot be interpreted as a branch.
    #[error("invalid ref '{refname}': {source}")]
    InvalidRef {
        refname: String,
        source: TypeError,
    },

    /// Reading the repository failed.
    #[error(transparent)]
    Git(GitError),
}

impl From<GitError> for ProbeError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { path } => ProbeError::RepositoryNotFound { path },
            GitError::RefNotFound { refname } => ProbeError::RefNotFound { refname },
            other => ProbeError::Git(other),
        }
    }
}

/// What to compare the subject against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// The branch of interest; `None` means whatever HEAD is on.
    pub branch: Option<BranchName>,
    /// Raw `pull.from`.
    pub pull_from: Option<String>,
    /// Raw `push.to`.
    pub push_to: Option<String>,
    /// Count untracked files as dirty.
    pub include_untracked: bool,
    /// Remote for push destinations without a remote prefix.
    pub default_remote: String,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            branch: None,
            pull_from: None,
            push_to: None,
            include_untracked: true,
            default_remote: "origin".to_string(),
        }
    }
}

impl ProbeRequest {
    /// Everything the planner needs to judge `descriptor`.
    pub fn for_descriptor(descriptor: &Descriptor, config: &Config) -> Self {
        Self {
            branch: descriptor.branch().cloned(),
            pull_from: descriptor.pull().map(|p| p.from().to_string()),
            push_to: descriptor.push().map(|p| p.to().to_string()),
            include_untracked: config.include_untracked(),
            default_remote: config.remote().to_string(),
        }
    }
}

/// The branch (or detached commit) the descriptor is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    /// Branch name; `None` when HEAD is detached and no branch was named.
    pub branch: Option<BranchName>,
    /// Commit the subject points at; `None` for an unborn branch.
    pub oid: Option<Oid>,
    /// Set when the branch exists only as a remote-tracking ref, so a
    /// checkout has to create it from there.
    pub start_point: Option<RefTarget>,
}

/// The subject compared against one other ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub target: RefTarget,
    pub target_oid: Option<Oid>,
    /// Whether the target ref exists locally.
    pub exists: bool,
    /// Commits on the subject not on the target.
    pub ahead: usize,
    /// Commits on the target not on the subject.
    pub behind: usize,
}

impl Divergence {
    /// The subject already contains every commit of the target.
    ///
    /// A target that has not been fetched cannot be known to be contained.
    pub fn is_descendant(&self) -> bool {
        self.exists && self.behind == 0
    }
}

/// Snapshot of a repository as the planner sees it.
///
/// Produced fresh by every probe and never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    pub current_ref: CurrentRef,
    pub head_oid: Option<Oid>,
    pub is_dirty: bool,
    pub has_upstream: bool,
    pub upstream: Option<String>,
    pub operation: GitState,
    /// Paths with unresolved conflicts.
    pub conflicts: Vec<String>,
    pub stash_depth: usize,
    pub subject: Subject,
    pub pull: Option<Divergence>,
    pub push: Option<Divergence>,
}

impl RepositoryState {
    /// Primary ahead count: against `pull.from` if requested, else `push.to`.
    pub fn ahead(&self) -> usize {
        self.primary().map(|d| d.ahead).unwrap_or(0)
    }

    /// Primary behind count: against `pull.from` if requested, else `push.to`.
    pub fn behind(&self) -> usize {
        self.primary().map(|d| d.behind).unwrap_or(0)
    }

    fn primary(&self) -> Option<&Divergence> {
        self.pull.as_ref().or(self.push.as_ref())
    }

    /// Whether HEAD is on the subject branch.
    pub fn subject_checked_out(&self) -> bool {
        match &self.subject.branch {
            Some(branch) => self.current_ref.is_on(branch),
            None => true,
        }
    }
}

/// Something that can observe repository state.
pub trait StateProbe {
    fn probe(&self) -> Result<RepositoryState, ProbeError>;
}

/// [`StateProbe`] reading a repository on disk.
#[derive(Debug, Clone)]
pub struct RepositoryProbe {
    path: PathBuf,
    request: ProbeRequest,
}

impl RepositoryProbe {
    pub fn new(path: impl Into<PathBuf>, request: ProbeRequest) -> Self {
        Self {
            path: path.into(),
            request,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateProbe for RepositoryProbe {
    fn probe(&self) -> Result<RepositoryState, ProbeError> {
        probe(&self.path, &self.request)
    }
}

/// Observe the repository containing `path`.
///
/// # Errors
///
/// - [`ProbeError::RepositoryNotFound`] if `path` is not in a work tree
/// - [`ProbeError::RefNotFound`] if the requested branch, or a local
///   `pull.from`, does not exist
#[tracing::instrument(skip(request), fields(path = %path.display()))]
pub fn probe(path: &Path, request: &ProbeRequest) -> Result<RepositoryState, ProbeError> {
    let git = match Git::open(path) {
        Ok(git) => git,
        Err(GitError::NotARepo { .. }) | Err(GitError::BareRepo) => {
            return Err(ProbeError::RepositoryNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let current_ref = git.current_ref()?;
    let head_oid = git.head_oid()?;
    let status = git.worktree_status(request.include_untracked)?;
    let operation = git.state();
    let conflicts = if status.has_conflicts || operation.is_in_progress() {
        git.conflicted_paths()?
    } else {
        Vec::new()
    };
    let upstream = match current_ref.branch() {
        Some(branch) => git.upstream_of(branch)?,
        None => None,
    };
    let remotes = git.remote_names()?;

    let subject = resolve_subject(&git, request, &current_ref, head_oid.as_ref(), &remotes)?;

    let pull = match &request.pull_from {
        Some(raw) => {
            let target = classify(raw, &remotes, None)?;
            let target_oid = git.try_resolve_ref(target.refname().as_str())?;
            // A remote branch may simply not have been fetched yet.
            if target_oid.is_none() && target.remote_name().is_none() {
                return Err(ProbeError::RefNotFound {
                    refname: raw.clone(),
                });
            }
            Some(measure(&git, &subject, target, target_oid)?)
        }
        None => None,
    };

    let push = match &request.push_to {
        Some(raw) => {
            let target = classify(raw, &remotes, Some(&request.default_remote))?;
            let target_oid = git.try_resolve_ref(target.refname().as_str())?;
            Some(measure(&git, &subject, target, target_oid)?)
        }
        None => None,
    };

    let state = RepositoryState {
        current_ref,
        head_oid,
        is_dirty: status.is_dirty(request.include_untracked),
        has_upstream: upstream.is_some(),
        upstream,
        operation,
        conflicts,
        stash_depth: git.stash_depth()?,
        subject,
        pull,
        push,
    };

    tracing::debug!(
        current = %state.current_ref,
        dirty = state.is_dirty,
        ahead = state.ahead(),
        behind = state.behind(),
        operation = %state.operation,
        "probed repository"
    );
    Ok(state)
}

/// Classify a written ref against the configured remotes.
///
/// With `push_remote` set, an unprefixed name is a branch on that remote;
/// otherwise it is a local branch.
pub fn classify(
    raw: &str,
    remotes: &[String],
    push_remote: Option<&str>,
) -> Result<RefTarget, ProbeError> {
    let invalid = |source| ProbeError::InvalidRef {
        refname: raw.to_string(),
        source,
    };

    if let Some((prefix, rest)) = raw.split_once('/') {
        if remotes.iter().any(|r| r == prefix) {
            let branch = BranchName::new(rest).map_err(invalid)?;
            return Ok(RefTarget::remote(prefix, branch));
        }
    }

    let branch = BranchName::new(raw).map_err(invalid)?;
    Ok(match push_remote {
        Some(remote) => RefTarget::remote(remote, branch),
        None => RefTarget::local(branch),
    })
}

fn resolve_subject(
    git: &Git,
    request: &ProbeRequest,
    current_ref: &CurrentRef,
    head_oid: Option<&Oid>,
    remotes: &[String],
) -> Result<Subject, ProbeError> {
    let branch = match &request.branch {
        Some(branch) => branch,
        None => {
            return Ok(Subject {
                branch: current_ref.branch().cloned(),
                oid: head_oid.cloned(),
                start_point: None,
            })
        }
    };

    if current_ref.is_on(branch) {
        return Ok(Subject {
            branch: Some(branch.clone()),
            oid: head_oid.cloned(),
            start_point: None,
        });
    }

    if let Some(oid) = git.try_resolve_ref(RefName::for_branch(branch).as_str())? {
        return Ok(Subject {
            branch: Some(branch.clone()),
            oid: Some(oid),
            start_point: None,
        });
    }

    // Default remote first, then any other remote carrying the branch.
    let candidates = std::iter::once(request.default_remote.as_str())
        .chain(remotes.iter().map(String::as_str))
        .filter(|r| remotes.iter().any(|known| known == r));
    for remote in candidates {
        let tracking = RefTarget::remote(remote, branch.clone());
        if let Some(oid) = git.try_resolve_ref(tracking.refname().as_str())? {
            return Ok(Subject {
                branch: Some(branch.clone()),
                oid: Some(oid),
                start_point: Some(tracking),
            });
        }
    }

    Err(ProbeError::RefNotFound {
        refname: branch.to_string(),
    })
}

fn measure(
    git: &Git,
    subject: &Subject,
    target: RefTarget,
    target_oid: Option<Oid>,
) -> Result<Divergence, ProbeError> {
    let (ahead, behind) = match (subject.oid.as_ref(), target_oid.as_ref()) {
        (Some(s), Some(t)) => (git.count_commits(s, Some(t))?, git.count_commits(t, Some(s))?),
        (Some(s), None) => (git.count_commits(s, None)?, 0),
        (None, Some(t)) => (0, git.count_commits(t, None)?),
        (None, None) => (0, 0),
    };
    Ok(Divergence {
        exists: target_oid.is_some(),
        target,
        target_oid,
        ahead,
        behind,
    })
}
