//! engine::report
//!
//! Aggregate a run into a serializable [`Outcome`].
//!
//! `changed` is true only when a non-empty plan ran to completion;
//! `changed == false && passed == true` means the repository was already
//! compliant.

use serde::Serialize;

use super::exec::{ActionRecord, ActionStatus, Execution};
use super::plan::{Plan, PlanId};
use super::planner::Noncompliance;
use super::probe::RepositoryState;
use crate::core::descriptor::Mode;
use crate::core::types::UtcTimestamp;

/// The repository as last observed, in reporting form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalState {
    #[serde(rename = "ref")]
    pub current_ref: String,
    pub head: Option<String>,
    pub dirty: bool,
    pub ahead: usize,
    pub behind: usize,
    pub has_upstream: bool,
    pub operation: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

impl From<&RepositoryState> for FinalState {
    fn from(state: &RepositoryState) -> Self {
        Self {
            current_ref: state.current_ref.to_string(),
            head: state.head_oid.as_ref().map(|o| o.to_string()),
            dirty: state.is_dirty,
            ahead: state.ahead(),
            behind: state.behind(),
            has_upstream: state.has_upstream,
            operation: state.operation.to_string(),
            conflicts: state.conflicts.clone(),
        }
    }
}

/// Result of one verify or ensure run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub passed: bool,
    pub mode: Mode,
    pub dry_run: bool,
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Noncompliance>,
    pub actions: Vec<ActionRecord>,
    pub plan_id: Option<PlanId>,
    pub plan_digest: Option<String>,
    /// The run stopped on a conflict and left an operation in progress.
    pub conflicted: bool,
    pub final_state: FinalState,
    pub checked_at: UtcTimestamp,
}

impl Outcome {
    fn base(mode: Mode, state: &RepositoryState) -> Self {
        Self {
            changed: false,
            passed: true,
            mode,
            dry_run: false,
            failures: Vec::new(),
            warnings: Vec::new(),
            violations: Vec::new(),
            actions: Vec::new(),
            plan_id: None,
            plan_digest: None,
            conflicted: false,
            final_state: FinalState::from(state),
            checked_at: UtcTimestamp::now(),
        }
    }

    /// Nothing to do.
    pub fn compliant(mode: Mode, state: &RepositoryState) -> Self {
        Self::base(mode, state)
    }

    /// Verify found the repository non-compliant.
    pub fn noncompliant(state: &RepositoryState, violations: Vec<Noncompliance>) -> Self {
        Self {
            passed: false,
            failures: violations.iter().map(|v| v.to_string()).collect(),
            violations,
            ..Self::base(Mode::Verify, state)
        }
    }

    /// Ensure planned actions but did not run them.
    pub fn planned(plan: &Plan, state: &RepositoryState) -> Self {
        Self {
            passed: plan.is_empty(),
            dry_run: true,
            actions: plan
                .actions()
                .iter()
                .map(|action| ActionRecord {
                    action: action.clone(),
                    status: ActionStatus::Planned,
                })
                .collect(),
            plan_id: Some(plan.id()),
            plan_digest: Some(plan.digest()),
            ..Self::base(Mode::Ensure, state)
        }
    }

    /// Ensure ran a plan.
    pub fn executed(plan_id: PlanId, digest: String, execution: Execution) -> Self {
        let succeeded = execution.result.is_success();
        let failures = execution
            .result
            .fault()
            .map(|f| vec![f.to_string()])
            .unwrap_or_default();

        Self {
            changed: succeeded && !execution.records.is_empty(),
            passed: succeeded,
            failures,
            warnings: execution.warnings,
            conflicted: execution.result.is_paused(),
            plan_id: Some(plan_id),
            plan_digest: Some(digest),
            actions: execution.records,
            ..Self::base(Mode::Ensure, &execution.final_state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::exec::{ExecuteResult, ExecutionFault};
    use crate::engine::fixtures::StateBuilder;
    use crate::engine::plan::Action;
    use crate::git::GitState;

    fn record(status: ActionStatus) -> ActionRecord {
        ActionRecord {
            action: Action::Commit {
                message: "x".into(),
            },
            status,
        }
    }

    mod final_state {
        use super::*;

        #[test]
        fn serializes_ref_key() {
            let state = StateBuilder::on("main").pull("origin/main", 1, 2).dirty().build();
            let json = serde_json::to_value(FinalState::from(&state)).unwrap();
            assert_eq!(json["ref"], "main");
            assert_eq!(json["dirty"], true);
            assert_eq!(json["ahead"], 1);
            assert_eq!(json["behind"], 2);
            assert_eq!(json["operation"], "clean");
            assert!(json.get("conflicts").is_none());
        }
    }

    mod outcome {
        use super::*;

        #[test]
        fn compliant_is_passed_and_unchanged() {
            let outcome = Outcome::compliant(Mode::Ensure, &StateBuilder::on("main").build());
            assert!(outcome.passed);
            assert!(!outcome.changed);
            assert!(outcome.failures.is_empty());
        }

        #[test]
        fn noncompliant_lists_failures() {
            let outcome = Outcome::noncompliant(
                &StateBuilder::on("main").dirty().build(),
                vec![Noncompliance::Uncommitted],
            );
            assert!(!outcome.passed);
            assert_eq!(outcome.failures, vec!["working tree has uncommitted changes"]);
            let json = serde_json::to_value(&outcome).unwrap();
            assert_eq!(json["mode"], "verify");
            assert_eq!(json["violations"][0]["kind"], "uncommitted");
        }

        #[test]
        fn successful_execution_changes() {
            let execution = Execution {
                result: ExecuteResult::Success,
                records: vec![record(ActionStatus::Applied)],
                warnings: vec![],
                final_state: StateBuilder::on("main").build(),
            };
            let outcome = Outcome::executed(PlanId::new(), "sha256:00".into(), execution);
            assert!(outcome.changed && outcome.passed);
            assert_eq!(outcome.actions[0].status, ActionStatus::Applied);
        }

        #[test]
        fn conflict_is_not_a_change() {
            let execution = Execution {
                result: ExecuteResult::Paused {
                    fault: ExecutionFault::RebaseConflict {
                        onto: "origin/main".into(),
                        paths: vec!["a.txt".into()],
                    },
                },
                records: vec![record(ActionStatus::Failed)],
                warnings: vec!["w".into()],
                final_state: StateBuilder::detached()
                    .operation(GitState::Rebase {
                        current: None,
                        total: None,
                    })
                    .conflicts(&["a.txt"])
                    .build(),
            };
            let outcome = Outcome::executed(PlanId::new(), "sha256:00".into(), execution);
            assert!(!outcome.changed && !outcome.passed);
            assert!(outcome.conflicted);
            assert!(outcome.failures[0].contains("a.txt"));
            assert_eq!(outcome.final_state.conflicts, vec!["a.txt"]);
            assert_eq!(outcome.warnings, vec!["w"]);
        }

        #[test]
        fn dry_run_marks_actions_planned() {
            let plan = Plan::new(vec![Action::Stash, Action::Unstash]);
            let outcome = Outcome::planned(&plan, &StateBuilder::on("main").build());
            assert!(outcome.dry_run);
            assert!(!outcome.changed);
            assert!(outcome
                .actions
                .iter()
                .all(|a| a.status == ActionStatus::Planned));
            assert_eq!(outcome.plan_digest, Some(plan.digest()));
        }
    }
}
