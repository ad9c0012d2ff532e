//! engine
//!
//! Orchestrates a reconciliation: Probe -> Decide -> [Execute] -> Report.
//!
//! # Architecture
//!
//! 1. **Probe**: Read repository state ([`probe`])
//! 2. **Decide**: Compare it with the descriptor ([`planner::decide`])
//! 3. **Execute**: Under ensure, apply the plan, re-probing after each
//!    action ([`exec`])
//! 4. **Report**: Fold everything into an [`Outcome`] ([`report`])
//!
//! ```text
//! Descriptor + RepositoryState -> decide -> verify: Outcome
//!                                        -> ensure: Executor -> Outcome
//! ```
//!
//! # Invariants
//!
//! - Descriptor and safety errors are raised before any mutation
//! - Verify never invokes the git runner
//! - The engine never mutates directly; all changes flow through the Executor
//!
//! # Example
//!
//! ```no_run
//! use gitensure::core::descriptor::Descriptor;
//! use gitensure::engine::{reconcile, Context};
//!
//! let descriptor = Descriptor::from_json(
//!     r#"{"branch": "main", "ensure": {"checked_out": true, "pull": {"from": "origin/main"}}}"#,
//! ).unwrap();
//! let outcome = reconcile(&descriptor, &Context::default()).unwrap();
//! println!("changed: {}", outcome.changed);
//! ```

pub mod exec;
pub mod plan;
pub mod planner;
pub mod probe;
pub mod report;

#[cfg(test)]
pub(crate) mod fixtures;

pub use exec::{ActionRecord, ActionStatus, ExecOptions, ExecuteResult, Execution, ExecutionFault, Executor};
pub use plan::{Action, Plan, PlanId, PushMode};
pub use planner::{check, decide, Decision, Noncompliance, SafetyError};
pub use probe::{
    probe, Divergence, ProbeError, ProbeRequest, RepositoryProbe, RepositoryState, StateProbe,
    Subject,
};
pub use report::{FinalState, Outcome};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::{Config, ConfigError};
use crate::core::descriptor::{Descriptor, DescriptorError, Mode};
use crate::git::{Git, GitError, GitRunner, ProcessRunner};

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    /// The directory relative paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// The repository a descriptor is about: its `repository` key resolved
    /// against the base directory, or the base directory itself.
    pub fn repository_for(&self, descriptor: &Descriptor) -> PathBuf {
        let base = self.base_dir();
        match descriptor.repository() {
            Some(path) => base.join(path),
            None => base,
        }
    }
}

/// Errors that stop a reconciliation before it can produce an [`Outcome`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The descriptor is invalid.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The repository could not be observed.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Converging would need an unauthorized destructive step.
    #[error("refusing to reconcile: {error}")]
    Safety {
        error: SafetyError,
        /// What the planner saw.
        state: Box<RepositoryState>,
    },
}

impl ReconcileError {
    /// The state snapshot attached to safety refusals.
    pub fn state(&self) -> Option<&RepositoryState> {
        match self {
            ReconcileError::Safety { state, .. } => Some(state),
            _ => None,
        }
    }
}

/// A repository opened for reconciliation, with its configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Locate the work tree containing `path` and load configuration.
    ///
    /// # Errors
    ///
    /// - [`ProbeError::RepositoryNotFound`] if `path` is not in a work tree
    /// - [`ConfigError`] if a config file is present but invalid
    pub fn open(path: &Path) -> Result<Self, ReconcileError> {
        let git = Git::open(path).map_err(|e| match e {
            GitError::NotARepo { .. } | GitError::BareRepo => ProbeError::RepositoryNotFound {
                path: path.to_path_buf(),
            },
            other => ProbeError::from(other),
        })?;
        let root = git.work_dir().map_err(ProbeError::from)?.to_path_buf();
        let config = Config::load(Some(&root))?.config;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A probe comparing against everything `descriptor` names.
    pub fn probe_for(&self, descriptor: &Descriptor) -> RepositoryProbe {
        RepositoryProbe::new(
            &self.root,
            ProbeRequest::for_descriptor(descriptor, &self.config),
        )
    }

    /// A runner honouring the configured git binary and identity.
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(&self.root)
            .with_binary(self.config.git_binary())
            .with_identity(self.config.commit_identity())
    }
}

/// Verify or ensure `descriptor` against the repository it names.
///
/// # Errors
///
/// See [`ReconcileError`]. Execution faults and verification failures are
/// not errors; they are reported in the [`Outcome`].
pub fn reconcile(descriptor: &Descriptor, ctx: &Context) -> Result<Outcome, ReconcileError> {
    let workspace = Workspace::open(&ctx.repository_for(descriptor))?;
    tracing::debug!(root = %workspace.root().display(), mode = %descriptor.mode(), "reconciling");

    let probe = workspace.probe_for(descriptor);
    let runner = workspace.runner();
    run(
        descriptor,
        &probe,
        &runner,
        ExecOptions::from_config(workspace.config()),
    )
}

/// Plan an ensure without executing it.
pub fn dry_run(descriptor: &Descriptor, ctx: &Context) -> Result<Outcome, ReconcileError> {
    let workspace = Workspace::open(&ctx.repository_for(descriptor))?;
    let probe = workspace.probe_for(descriptor);
    preview(&descriptor.with_mode(Mode::Ensure), &probe)
}

/// The lifecycle over explicit collaborators.
pub fn run<P: StateProbe, R: GitRunner>(
    descriptor: &Descriptor,
    probe: &P,
    runner: &R,
    options: ExecOptions,
) -> Result<Outcome, ReconcileError> {
    let state = probe.probe()?;
    let decision = decide_or_refuse(descriptor, &state)?;

    Ok(match decision {
        Decision::Compliant => Outcome::compliant(descriptor.mode(), &state),
        Decision::Violations(violations) => Outcome::noncompliant(&state, violations),
        Decision::Plan(plan) => {
            let plan_id = plan.id();
            let digest = plan.digest();
            tracing::info!(plan_id = %plan_id, digest = %digest, actions = plan.len(), "executing plan");
            let execution = Executor::new(probe, runner, options).execute(plan, state);
            Outcome::executed(plan_id, digest, execution)
        }
    })
}

/// Decide under ensure and report the plan without running it.
pub fn preview<P: StateProbe>(descriptor: &Descriptor, probe: &P) -> Result<Outcome, ReconcileError> {
    let state = probe.probe()?;
    Ok(match decide_or_refuse(descriptor, &state)? {
        Decision::Plan(plan) => Outcome::planned(&plan, &state),
        Decision::Compliant | Decision::Violations(_) => Outcome::compliant(Mode::Ensure, &state),
    })
}

fn decide_or_refuse(
    descriptor: &Descriptor,
    state: &RepositoryState,
) -> Result<Decision, ReconcileError> {
    decide(descriptor, state).map_err(|error| {
        tracing::warn!(%error, "refusing to reconcile");
        ReconcileError::Safety {
            error,
            state: Box::new(state.clone()),
        }
    })
}
