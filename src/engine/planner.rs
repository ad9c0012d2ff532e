//! engine::planner
//!
//! The decision core: compare a [`Descriptor`] with a [`RepositoryState`].
//!
//! # Architecture
//!
//! [`decide`] is one pure function consumed by two thin callers:
//!
//! - `verify` gets [`Decision::Compliant`] or [`Decision::Violations`]
//! - `ensure` gets [`Decision::Compliant`] or [`Decision::Plan`], or a
//!   [`SafetyError`] when converging would need a destructive step the
//!   descriptor did not authorize
//!
//! Both modes run the same checks, so a repository that verifies clean is
//! exactly one for which ensure plans nothing.
//!
//! # Ordering
//!
//! Actions are always emitted as
//!
//! ```text
//! checkout -> fetch -> stash -> rebase|merge -> unstash -> commit -> push
//! ```
//!
//! Committing before pulling would commit on top of stale history; pushing
//! before committing would omit the change.
//!
//! # Invariants
//!
//! - No I/O, no mutation
//! - Safety errors are raised before any action runs
//! - A plain push is never planned against a destination that has commits
//!   the subject lacks, unless the same plan first pulls from it

use serde::Serialize;
use thiserror::Error;

use crate::core::descriptor::{Descriptor, Mode, PushStrategy};
use crate::core::types::{BranchName, RefTarget};
use crate::engine::plan::{Action, Plan, PushMode};
use crate::engine::probe::RepositoryState;
use crate::git::{CurrentRef, GitState};

/// A way the repository fails to satisfy the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Noncompliance {
    /// HEAD is not on the requested branch (or detached with none requested).
    NotCheckedOut {
        expected: Option<BranchName>,
        actual: CurrentRef,
    },
    /// The subject is missing commits from `pull.from`.
    NotDescendant { target: RefTarget, behind: usize },
    /// `pull.from` is a remote branch with no local tracking ref yet.
    Unfetched { target: RefTarget },
    /// The working tree has uncommitted changes.
    Uncommitted,
    /// The subject has commits `push.to` lacks.
    Unpushed { target: RefTarget, ahead: usize },
}

impl std::fmt::Display for Noncompliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Noncompliance::NotCheckedOut {
                expected: Some(branch),
                actual,
            } => write!(f, "'{}' is not checked out (HEAD is {})", branch, actual),
            Noncompliance::NotCheckedOut {
                expected: None,
                actual,
            } => write!(f, "no branch is checked out (HEAD is {})", actual),
            Noncompliance::NotDescendant { target, behind } => write!(
                f,
                "not a descendant of {} ({} commit{} behind)",
                target,
                behind,
                plural(*behind)
            ),
            Noncompliance::Unfetched { target } => {
                write!(f, "{} has not been fetched; its commits are unknown", target)
            }
            Noncompliance::Uncommitted => write!(f, "working tree has uncommitted changes"),
            Noncompliance::Unpushed { target, ahead } => write!(
                f,
                "{} commit{} not pushed to {}",
                ahead,
                plural(*ahead),
                target
            ),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Converging would require a step the descriptor did not authorize.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyError {
    /// A plain push to a destination that has diverged.
    #[error(
        "push to {target} would not fast-forward ({behind} remote commit(s) not in the local branch); \
         set push.force_with_lease or pull from {target} first"
    )]
    NonFastForwardRisk {
        target: RefTarget,
        ahead: usize,
        behind: usize,
    },

    /// A pull is needed but the tree is dirty and autostash is off.
    #[error("working tree is dirty; pulling from {target} needs pull.rebase with pull.autostash, or a clean tree")]
    DirtyTree { target: RefTarget },

    /// Changes would be made on a detached HEAD with no branch named.
    #[error("HEAD is detached and the descriptor names no branch")]
    DetachedHead,

    /// A push destination that resolved to no remote.
    #[error("push destination {target} names no remote")]
    NoPushRemote { target: RefTarget },

    /// A rebase, merge or similar is already in progress.
    #[error("a {operation} is in progress; finish or abort it first")]
    OperationInProgress { operation: GitState },
}

/// Outcome of comparing a descriptor with the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do.
    Compliant,
    /// Under ensure: the actions that converge the repository.
    Plan(Plan),
    /// Under verify: every requirement that does not hold.
    Violations(Vec<Noncompliance>),
}

impl Decision {
    pub fn is_compliant(&self) -> bool {
        matches!(self, Decision::Compliant)
    }
}

/// Decide what, if anything, `descriptor` requires of the repository.
///
/// # Errors
///
/// Only under [`Mode::Ensure`]; see [`SafetyError`].
pub fn decide(descriptor: &Descriptor, state: &RepositoryState) -> Result<Decision, SafetyError> {
    let findings = check(descriptor, state);
    if findings.is_empty() {
        return Ok(Decision::Compliant);
    }

    match descriptor.mode() {
        Mode::Verify => Ok(Decision::Violations(findings)),
        Mode::Ensure => {
            let plan = plan(descriptor, state)?;
            tracing::debug!(plan_id = %plan.id(), actions = plan.len(), "planned");
            Ok(Decision::Plan(plan))
        }
    }
}

/// Every requirement of `descriptor` that `state` does not satisfy.
///
/// An empty result means compliant, in either mode.
pub fn check(descriptor: &Descriptor, state: &RepositoryState) -> Vec<Noncompliance> {
    let mut findings = Vec::new();

    if descriptor.checked_out() {
        let satisfied = match descriptor.branch() {
            Some(branch) => state.current_ref.is_on(branch),
            None => !matches!(state.current_ref, CurrentRef::Detached(_)),
        };
        if !satisfied {
            findings.push(Noncompliance::NotCheckedOut {
                expected: descriptor.branch().cloned(),
                actual: state.current_ref.clone(),
            });
        }
    }

    if let (Some(_), Some(pull)) = (descriptor.pull(), &state.pull) {
        if !pull.exists {
            findings.push(Noncompliance::Unfetched {
                target: pull.target.clone(),
            });
        } else if !pull.is_descendant() {
            findings.push(Noncompliance::NotDescendant {
                target: pull.target.clone(),
                behind: pull.behind,
            });
        }
    }

    if descriptor.committed().is_some() && state.is_dirty {
        findings.push(Noncompliance::Uncommitted);
    }

    if let (Some(_), Some(push)) = (descriptor.push(), &state.push) {
        if push.ahead > 0 {
            findings.push(Noncompliance::Unpushed {
                target: push.target.clone(),
                ahead: push.ahead,
            });
        }
    }

    findings
}

fn plan(descriptor: &Descriptor, state: &RepositoryState) -> Result<Plan, SafetyError> {
    if state.operation.is_in_progress() {
        return Err(SafetyError::OperationInProgress {
            operation: state.operation.clone(),
        });
    }

    let mut needs_checkout = false;
    if descriptor.checked_out() {
        match descriptor.branch() {
            Some(branch) => needs_checkout |= !state.current_ref.is_on(branch),
            None if matches!(state.current_ref, CurrentRef::Detached(_)) => {
                return Err(SafetyError::DetachedHead)
            }
            None => {}
        }
    }

    // Pull: fetch, then stash/rebase/unstash or a plain rebase or merge.
    let mut pull_actions = Vec::new();
    let mut pulled_from = None;
    if let (Some(spec), Some(pull)) = (descriptor.pull(), &state.pull) {
        if !pull.is_descendant() {
            if state.is_dirty && !spec.autostash() {
                return Err(SafetyError::DirtyTree {
                    target: pull.target.clone(),
                });
            }
            let stash = state.is_dirty;

            if let RefTarget::Remote { remote, branch } = &pull.target {
                pull_actions.push(Action::Fetch {
                    remote: remote.clone(),
                    branch: branch.clone(),
                });
            }
            if stash {
                pull_actions.push(Action::Stash);
            }
            // An unborn branch has nothing to replay; merging fast-forwards it.
            if spec.rebase() && state.subject.oid.is_some() {
                pull_actions.push(Action::Rebase {
                    onto: pull.target.clone(),
                });
            } else {
                pull_actions.push(Action::Merge {
                    from: pull.target.clone(),
                });
            }
            if stash {
                pull_actions.push(Action::Unstash);
            }
            pulled_from = Some(&pull.target);
        }
    }

    let commit = match descriptor.committed() {
        Some(spec) if state.is_dirty => Some(Action::Commit {
            message: spec.message().to_string(),
        }),
        _ => None,
    };

    // Pull and commit act on the working tree, so they need the subject checked out.
    if (!pull_actions.is_empty() || commit.is_some()) && !state.subject_checked_out() {
        needs_checkout = true;
    }
    if (!pull_actions.is_empty() || commit.is_some()) && state.subject.branch.is_none() {
        return Err(SafetyError::DetachedHead);
    }

    let mut actions = Vec::new();
    if needs_checkout {
        if let Some(branch) = &state.subject.branch {
            actions.push(Action::Checkout {
                branch: branch.clone(),
                start_point: state.subject.start_point.clone(),
            });
        }
    }
    actions.extend(pull_actions);
    actions.extend(commit);

    if let (Some(spec), Some(push)) = (descriptor.push(), &state.push) {
        let rewrites = actions.iter().any(Action::rewrites_history);
        if push.ahead > 0 || rewrites {
            let RefTarget::Remote { remote, branch } = &push.target else {
                return Err(SafetyError::NoPushRemote {
                    target: push.target.clone(),
                });
            };
            let mode = match spec.strategy() {
                PushStrategy::FastForward => {
                    let reconciled = pulled_from == Some(&push.target);
                    if push.behind > 0 && !reconciled {
                        return Err(SafetyError::NonFastForwardRisk {
                            target: push.target.clone(),
                            ahead: push.ahead,
                            behind: push.behind,
                        });
                    }
                    PushMode::FastForward
                }
                PushStrategy::Force => PushMode::Force,
                PushStrategy::ForceWithLease => PushMode::ForceWithLease {
                    expected: push.target_oid.clone(),
                },
            };
            actions.push(Action::Push {
                remote: remote.clone(),
                branch: branch.clone(),
                mode,
            });
        }
    }

    Ok(Plan::new(actions))
}
