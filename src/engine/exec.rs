//! engine::exec
//!
//! The executor: the only component that mutates the repository.
//!
//! # Architecture
//!
//! A small explicit state machine over a consumed [`Plan`]:
//!
//! ```text
//! position, last-known state, pending unstash
//!     -> run action (one or two git invocations)
//!     -> re-probe
//!     -> check post-condition
//!     -> advance, or stop at the first fault
//! ```
//!
//! # Executor Contract
//!
//! 1. Actions run strictly in plan order, one git invocation at a time
//! 2. After every action the repository is re-probed and the action's
//!    post-condition asserted; a mismatch is a fault, never ignored
//! 3. The first fault stops execution; later actions are reported skipped
//! 4. Rebase and merge conflicts leave the repository mid-operation for
//!    a human to inspect; nothing is aborted automatically
//! 5. If a stash was taken and not yet restored, `stash pop` is attempted
//!    after a fault; its failure is a warning, never the primary fault
//! 6. Nothing is retried
//!
//! # Example
//!
//! ```ignore
//! use gitensure::engine::exec::{ExecOptions, Executor};
//!
//! let executor = Executor::new(&probe, &runner, ExecOptions::default());
//! let execution = executor.execute(plan, state);
//! if let Some(fault) = execution.result.fault() {
//!     eprintln!("stopped: {}", fault);
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

use super::plan::{Action, Plan, PushMode};
use super::probe::{ProbeError, RepositoryState, StateProbe};
use crate::core::config::Config;
use crate::core::types::RefName;
use crate::git::{GitOutput, GitRunner, RunnerError};

/// Message recorded on stashes the executor creates.
const STASH_MESSAGE: &str = "gitensure autostash";

/// Why execution stopped.
#[derive(Debug, Error)]
pub enum ExecutionFault {
    /// git exited non-zero.
    #[error("{action}: git exited with {exit_code}: {message}")]
    ActionFailed {
        action: String,
        exit_code: i32,
        message: String,
    },

    /// git succeeded but the repository is not in the expected state.
    #[error("{action}: expected {expected}, found {found}")]
    PostconditionFailed {
        action: String,
        expected: String,
        found: String,
    },

    /// The rebase stopped on conflicts; the rebase is still in progress.
    #[error("rebase onto {onto} stopped with conflicts in: {}", .paths.join(", "))]
    RebaseConflict { onto: String, paths: Vec<String> },

    /// The merge stopped on conflicts; the merge is still in progress.
    #[error("merge of {from} stopped with conflicts in: {}", .paths.join(", "))]
    MergeConflict { from: String, paths: Vec<String> },

    /// The remote refused the push (not a fast-forward, or the lease broke).
    #[error("push to {target} rejected: {message}")]
    PushRejected { target: String, message: String },

    /// git could not be started.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Re-probing after an action failed.
    #[error("re-probe failed: {0}")]
    Probe(#[from] ProbeError),
}

impl ExecutionFault {
    /// Conflicts leave an operation in progress rather than aborting it.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ExecutionFault::RebaseConflict { .. } | ExecutionFault::MergeConflict { .. }
        )
    }
}

/// What happened to one planned action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Ran and its post-condition held.
    Applied,
    /// Ran and stopped execution.
    Failed,
    /// Not attempted because an earlier action failed.
    Skipped,
    /// A restore run after a fault, outside plan order.
    Unwound,
    /// Not run: the plan was only previewed.
    Planned,
}

/// One planned action and its fate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub action: Action,
    pub status: ActionStatus,
}

/// Result of executing a plan.
#[derive(Debug)]
pub enum ExecuteResult {
    /// Every action applied.
    Success,

    /// Stopped on a conflict; the operation is left in progress.
    Paused { fault: ExecutionFault },

    /// Stopped on any other fault.
    Aborted { fault: ExecutionFault },
}

impl ExecuteResult {
    /// Check if execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecuteResult::Success)
    }

    /// Check if execution was paused on a conflict.
    pub fn is_paused(&self) -> bool {
        matches!(self, ExecuteResult::Paused { .. })
    }

    pub fn fault(&self) -> Option<&ExecutionFault> {
        match self {
            ExecuteResult::Success => None,
            ExecuteResult::Paused { fault } | ExecuteResult::Aborted { fault } => Some(fault),
        }
    }
}

/// Everything the reporter needs from a run.
#[derive(Debug)]
pub struct Execution {
    pub result: ExecuteResult,
    pub records: Vec<ActionRecord>,
    pub warnings: Vec<String>,
    /// State from the last successful probe.
    pub final_state: RepositoryState,
}

/// Knobs that change how actions are spelled as git commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Stage and stash untracked files too.
    pub include_untracked: bool,
    /// Run commit hooks; `false` passes `--no-verify`.
    pub verify_hooks: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            include_untracked: true,
            verify_hooks: true,
        }
    }
}

impl ExecOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            include_untracked: config.include_untracked(),
            verify_hooks: config.verify_hooks(),
        }
    }
}

/// Executor position within a plan.
struct Cursor {
    position: usize,
    state: RepositoryState,
    /// A stash was taken that no later action has restored yet.
    stash_pending: bool,
}

/// Applies plans through a [`GitRunner`], checking each step with a
/// [`StateProbe`].
pub struct Executor<'a, P: StateProbe, R: GitRunner> {
    probe: &'a P,
    runner: &'a R,
    options: ExecOptions,
}

impl<'a, P: StateProbe, R: GitRunner> Executor<'a, P, R> {
    pub fn new(probe: &'a P, runner: &'a R, options: ExecOptions) -> Self {
        Self {
            probe,
            runner,
            options,
        }
    }

    /// Execute `plan` starting from the state it was planned against.
    pub fn execute(&self, plan: Plan, initial: RepositoryState) -> Execution {
        let plan_id = plan.id();
        let actions = plan.into_actions();
        let mut cursor = Cursor {
            position: 0,
            state: initial,
            stash_pending: false,
        };
        let mut records: Vec<ActionRecord> = actions
            .iter()
            .map(|action| ActionRecord {
                action: action.clone(),
                status: ActionStatus::Skipped,
            })
            .collect();
        let mut warnings = Vec::new();
        let mut fault = None;

        while cursor.position < actions.len() {
            let action = &actions[cursor.position];
            tracing::info!(
                plan_id = %plan_id,
                step = cursor.position + 1,
                action = action.kind(),
                "applying {}",
                action
            );

            match self.step(action, &mut cursor) {
                Ok(()) => {
                    records[cursor.position].status = ActionStatus::Applied;
                    cursor.position += 1;
                }
                Err(f) => {
                    tracing::warn!(plan_id = %plan_id, action = action.kind(), error = %f, "action failed");
                    records[cursor.position].status = ActionStatus::Failed;
                    fault = Some(f);
                    break;
                }
            }
        }

        if fault.is_some() && cursor.stash_pending {
            self.unwind_stash(&mut cursor, &actions, &mut records, &mut warnings);
        }

        let result = match fault {
            None => ExecuteResult::Success,
            Some(fault) if fault.is_conflict() => ExecuteResult::Paused { fault },
            Some(fault) => ExecuteResult::Aborted { fault },
        };

        Execution {
            result,
            records,
            warnings,
            final_state: cursor.state,
        }
    }

    /// Run one action, re-probe, and check its post-condition.
    fn step(&self, action: &Action, cursor: &mut Cursor) -> Result<(), ExecutionFault> {
        // One pop attempt per stash, whether or not it succeeds.
        if matches!(action, Action::Unstash) {
            cursor.stash_pending = false;
        }

        for args in self.commands(action, &cursor.state) {
            let output = self.runner.run(&args)?;
            if !output.success() {
                return Err(self.failure(action, &output, cursor));
            }
        }

        // Taken once git exits 0; a failing re-probe still leaves it to unwind.
        if matches!(action, Action::Stash) {
            cursor.stash_pending = true;
        }

        let after = self.probe.probe()?;
        // `stash push` exits 0 without stashing when it finds nothing to
        // shelve; popping then would take someone else's entry.
        if matches!(action, Action::Stash) && after.stash_depth <= cursor.state.stash_depth {
            cursor.stash_pending = false;
        }
        let check = postcondition(action, &cursor.state, &after);
        cursor.state = after;
        check
    }

    /// Best-effort `stash pop` after a fault.
    fn unwind_stash(
        &self,
        cursor: &mut Cursor,
        actions: &[Action],
        records: &mut [ActionRecord],
        warnings: &mut Vec<String>,
    ) {
        let pending = actions
            .iter()
            .enumerate()
            .skip(cursor.position + 1)
            .find(|(_, a)| matches!(a, Action::Unstash))
            .map(|(i, _)| i);

        tracing::info!("restoring stashed changes after failure");
        let attempt = self
            .runner
            .run(&unstash_args())
            .map_err(|e| e.to_string())
            .and_then(|out| {
                if out.success() {
                    Ok(())
                } else {
                    Err(out.message().to_string())
                }
            });

        match attempt {
            Ok(()) => {
                if let Some(i) = pending {
                    records[i].status = ActionStatus::Unwound;
                }
                match self.probe.probe() {
                    Ok(state) => cursor.state = state,
                    Err(e) => warnings.push(format!("could not re-probe after restoring stash: {}", e)),
                }
            }
            Err(message) => {
                tracing::warn!(error = %message, "stash restore failed");
                warnings.push(format!(
                    "stashed changes were not restored ({}); recover them with 'git stash pop'",
                    message
                ));
            }
        }
    }

    /// Turn a non-zero exit into the most specific fault.
    fn failure(&self, action: &Action, output: &GitOutput, cursor: &mut Cursor) -> ExecutionFault {
        match action {
            Action::Rebase { onto } => {
                if let Some(paths) = self.conflicts(cursor) {
                    return ExecutionFault::RebaseConflict {
                        onto: onto.to_string(),
                        paths,
                    };
                }
            }
            Action::Merge { from } => {
                if let Some(paths) = self.conflicts(cursor) {
                    return ExecutionFault::MergeConflict {
                        from: from.to_string(),
                        paths,
                    };
                }
            }
            Action::Push { remote, branch, .. } if is_push_rejection(output) => {
                return ExecutionFault::PushRejected {
                    target: format!("{}/{}", remote, branch),
                    message: output.message().to_string(),
                };
            }
            _ => {}
        }

        ExecutionFault::ActionFailed {
            action: action.description(),
            exit_code: output.exit_code,
            message: output.message().to_string(),
        }
    }

    /// Re-probe after a failed rebase or merge; `Some` if it stopped on
    /// conflicts and is still in progress.
    fn conflicts(&self, cursor: &mut Cursor) -> Option<Vec<String>> {
        let after = self.probe.probe().ok()?;
        let stopped = after.operation.is_in_progress() || !after.conflicts.is_empty();
        let paths = after.conflicts.clone();
        cursor.state = after;
        stopped.then_some(paths)
    }

    /// The git invocations for `action`, in order.
    fn commands(&self, action: &Action, state: &RepositoryState) -> Vec<Vec<String>> {
        let cmd = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match action {
            Action::Checkout {
                branch,
                start_point: None,
            } => vec![cmd(&["checkout", branch.as_str(), "--"])],
            Action::Checkout {
                branch,
                start_point: Some(from),
            } => vec![cmd(&[
                "checkout",
                "-b",
                branch.as_str(),
                "--track",
                &from.to_string(),
            ])],
            Action::Stash => {
                let mut args = cmd(&["stash", "push"]);
                if self.options.include_untracked {
                    args.push("--include-untracked".into());
                }
                args.extend(cmd(&["-m", STASH_MESSAGE]));
                vec![args]
            }
            Action::Unstash => vec![unstash_args()],
            Action::Fetch { remote, branch } => {
                let refspec = format!(
                    "+{}:{}",
                    RefName::for_branch(branch),
                    RefName::for_remote_branch(remote, branch)
                );
                vec![cmd(&["fetch", remote.as_str(), &refspec])]
            }
            Action::Rebase { onto } => vec![cmd(&["rebase", onto.refname().as_str()])],
            Action::Merge { from } => {
                vec![cmd(&["merge", "--no-edit", from.refname().as_str()])]
            }
            Action::Commit { message } => {
                let stage = if self.options.include_untracked {
                    "--all"
                } else {
                    "--update"
                };
                let mut commit = cmd(&["commit", "-m", message.as_str()]);
                if !self.options.verify_hooks {
                    commit.push("--no-verify".into());
                }
                vec![cmd(&["add", stage]), commit]
            }
            Action::Push {
                remote,
                branch,
                mode,
            } => {
                let destination = RefName::for_branch(branch);
                let source = match &state.subject.branch {
                    Some(subject) if !state.subject_checked_out() => {
                        RefName::for_branch(subject).to_string()
                    }
                    _ => "HEAD".to_string(),
                };
                let mut args = cmd(&["push"]);
                match mode {
                    PushMode::FastForward => {}
                    PushMode::Force => args.push("--force".into()),
                    PushMode::ForceWithLease { expected } => args.push(format!(
                        "--force-with-lease={}:{}",
                        destination,
                        expected.as_ref().map(|o| o.as_str()).unwrap_or("")
                    )),
                }
                args.push(remote.clone());
                args.push(format!("{}:{}", source, destination));
                vec![args]
            }
        }
    }
}

fn unstash_args() -> Vec<String> {
    vec!["stash".to_string(), "pop".to_string()]
}

fn is_push_rejection(output: &GitOutput) -> bool {
    let text = format!("{}\n{}", output.stderr, output.stdout);
    ["[rejected]", "[remote rejected]", "stale info", "non-fast-forward"]
        .iter()
        .any(|marker| text.contains(marker))
}

/// Check that `after` is what `action` should have produced from `before`.
fn postcondition(
    action: &Action,
    before: &RepositoryState,
    after: &RepositoryState,
) -> Result<(), ExecutionFault> {
    let fail = |expected: String, found: String| ExecutionFault::PostconditionFailed {
        action: action.description(),
        expected,
        found,
    };

    match action {
        Action::Checkout { branch, .. } => {
            if !after.current_ref.is_on(branch) {
                return Err(fail(
                    format!("HEAD on '{}'", branch),
                    format!("HEAD is {}", after.current_ref),
                ));
            }
        }
        Action::Stash | Action::Commit { .. } => {
            if after.is_dirty {
                return Err(fail("a clean working tree".into(), "pending changes".into()));
            }
        }
        Action::Unstash => {
            if after.stash_depth >= before.stash_depth {
                return Err(fail(
                    format!("stash depth below {}", before.stash_depth),
                    format!("stash depth {}", after.stash_depth),
                ));
            }
        }
        Action::Fetch { .. } => {
            if let Some(pull) = &after.pull {
                if !pull.exists {
                    return Err(fail(
                        format!("{} to exist", pull.target),
                        "no such ref".into(),
                    ));
                }
            }
        }
        Action::Rebase { .. } | Action::Merge { .. } => {
            if after.operation.is_in_progress() {
                return Err(fail(
                    "no operation in progress".into(),
                    format!("{} in progress", after.operation),
                ));
            }
            if let Some(pull) = &after.pull {
                if pull.behind > 0 {
                    return Err(fail(
                        format!("a descendant of {}", pull.target),
                        format!("{} commit(s) behind", pull.behind),
                    ));
                }
            }
        }
        Action::Push { .. } => {
            if let Some(push) = &after.push {
                if push.ahead > 0 {
                    return Err(fail(
                        format!("{} up to date", push.target),
                        format!("{} commit(s) ahead", push.ahead),
                    ));
                }
            }
        }
    }
    Ok(())
}
