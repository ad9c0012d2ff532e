//! engine::plan
//!
//! The ordered actions that converge a repository.
//!
//! # Architecture
//!
//! Plans are the sole intermediate representation between an observed
//! [`RepositoryState`](super::probe::RepositoryState) and repository
//! mutation. Plans are:
//! - **Deterministic**: Same descriptor and state always produce the same actions
//! - **Previewable**: `--dry-run` prints [`Plan::preview`]
//! - **Serializable**: Included in JSON results and digested for identity
//!
//! # Invariants
//!
//! - Only the planner constructs plans; there is no API to add, remove or
//!   reorder actions afterwards
//! - The executor consumes a plan by value, exactly once
//!
//! # Example
//!
//! ```
//! use gitensure::engine::plan::{Action, PushMode};
//! use gitensure::core::types::BranchName;
//!
//! let push = Action::Push {
//!     remote: "origin".into(),
//!     branch: BranchName::new("prod").unwrap(),
//!     mode: PushMode::Force,
//! };
//! assert_eq!(push.description(), "Force push to origin/prod");
//! assert!(!push.rewrites_history());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::types::{BranchName, Oid, RefTarget};

/// How a push treats the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushMode {
    /// Plain push; git refuses anything but a fast-forward.
    FastForward,
    /// `--force`.
    Force,
    /// `--force-with-lease`, expecting the destination at `expected`
    /// (`None`: the destination must not exist).
    ForceWithLease { expected: Option<Oid> },
}

/// A single git operation in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Switch HEAD to `branch`, creating it from `start_point` if it only
    /// exists as a remote-tracking ref.
    Checkout {
        branch: BranchName,
        start_point: Option<RefTarget>,
    },

    /// Shelve local changes before a rebase.
    Stash,

    /// Re-apply what [`Action::Stash`] shelved.
    Unstash,

    /// Update `refs/remotes/<remote>/<branch>`.
    Fetch { remote: String, branch: BranchName },

    /// Rebase the checked-out branch onto `onto`.
    Rebase { onto: RefTarget },

    /// Merge `from` into the checked-out branch.
    Merge { from: RefTarget },

    /// Record all pending changes.
    Commit { message: String },

    /// Publish the subject to `<remote>/<branch>`.
    Push {
        remote: String,
        branch: BranchName,
        mode: PushMode,
    },
}

impl Action {
    /// Whether the action creates or rewrites commits on the subject.
    ///
    /// Such actions make a requested push necessary even if the subject
    /// was not ahead before.
    pub fn rewrites_history(&self) -> bool {
        matches!(
            self,
            Action::Rebase { .. } | Action::Merge { .. } | Action::Commit { .. }
        )
    }

    /// Short machine name, as used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Checkout { .. } => "checkout",
            Action::Stash => "stash",
            Action::Unstash => "unstash",
            Action::Fetch { .. } => "fetch",
            Action::Rebase { .. } => "rebase",
            Action::Merge { .. } => "merge",
            Action::Commit { .. } => "commit",
            Action::Push { .. } => "push",
        }
    }

    /// Get a human-readable description of this action.
    pub fn description(&self) -> String {
        match self {
            Action::Checkout {
                branch,
                start_point: None,
            } => format!("Check out '{}'", branch),
            Action::Checkout {
                branch,
                start_point: Some(from),
            } => format!("Check out '{}' (new, tracking {})", branch, from),
            Action::Stash => "Stash local changes".to_string(),
            Action::Unstash => "Restore stashed changes".to_string(),
            Action::Fetch { remote, branch } => format!("Fetch '{}' from {}", branch, remote),
            Action::Rebase { onto } => format!("Rebase onto {}", onto),
            Action::Merge { from } => format!("Merge {}", from),
            Action::Commit { message } => format!("Commit pending changes: {}", message),
            Action::Push {
                remote,
                branch,
                mode,
            } => match mode {
                PushMode::FastForward => format!("Push to {}/{}", remote, branch),
                PushMode::Force => format!("Force push to {}/{}", remote, branch),
                PushMode::ForceWithLease {
                    expected: Some(oid),
                } => format!(
                    "Force push to {}/{} (lease: {})",
                    remote,
                    branch,
                    oid.short(12)
                ),
                PushMode::ForceWithLease { expected: None } => format!(
                    "Force push to {}/{} (lease: must not exist)",
                    remote, branch
                ),
            },
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Identifier correlating a plan with its logs and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, ordered list of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    id: PlanId,
    actions: Vec<Action>,
}

impl Plan {
    /// Wrap a fully-ordered action list.
    pub(crate) fn new(actions: Vec<Action>) -> Self {
        Self {
            id: PlanId::new(),
            actions,
        }
    }

    pub fn id(&self) -> PlanId {
        self.id
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Consume the plan, yielding its actions in order.
    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    /// SHA-256 over the canonical JSON of the actions.
    ///
    /// The plan id is excluded, so two plans with identical actions have
    /// identical digests.
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self.actions).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Generate a preview string for `--dry-run`.
    pub fn preview(&self) -> String {
        if self.is_empty() {
            return "No changes needed".to_string();
        }
        self.actions
            .iter()
            .enumerate()
            .map(|(i, a)| format!("  {}. {}", i + 1, a.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
