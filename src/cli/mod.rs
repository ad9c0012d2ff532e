//! cli
//!
//! Command-line interface layer for gitensure.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Map outcomes and errors to exit statuses
//! - Does NOT perform repository mutations directly
//!
//! # Exit status
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Compliant or converged                              |
//! | 1    | Not compliant, execution failed, or conflict        |
//! | 2    | Invalid descriptor or configuration                 |
//! | 3    | Repository could not be probed, or safety refusal   |

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::core::config::ConfigError;
use crate::core::descriptor::DescriptorError;
use crate::engine::{self, ProbeError, ReconcileError};
use crate::ui::output::{self, Verbosity};
use serde_json::json;

/// Process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failed = 1,
    Invalid = 2,
    Refused = 3,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Classify an error that escaped a command handler.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<ReconcileError>() {
            return match err {
                ReconcileError::Descriptor(_) | ReconcileError::Config(_) => ExitStatus::Invalid,
                ReconcileError::Probe(_) | ReconcileError::Safety { .. } => ExitStatus::Refused,
            };
        }
        if err.downcast_ref::<DescriptorError>().is_some()
            || err.downcast_ref::<ConfigError>().is_some()
        {
            return ExitStatus::Invalid;
        }
        if err.downcast_ref::<ProbeError>().is_some() {
            return ExitStatus::Refused;
        }
        ExitStatus::Failed
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`. Errors are reported
/// here; the caller only needs the status.
pub fn run(cli: Cli) -> ExitStatus {
    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };
    let json = cli.json;

    match commands::dispatch(cli.command, &ctx, json) {
        Ok(status) => status,
        Err(err) => {
            let status = ExitStatus::for_error(&err);
            report_error(&err, json);
            status
        }
    }
}

fn report_error(err: &anyhow::Error, json: bool) {
    if !json {
        output::error(format!("{:#}", err));
        return;
    }

    let state = err
        .downcast_ref::<ReconcileError>()
        .and_then(ReconcileError::state);
    let document = json!({
        "passed": false,
        "error": format!("{:#}", err),
        "state": state,
    });
    if let Err(e) = output::json(&document) {
        output::error(e);
    }
}

/// Verbosity for the given global flags.
pub fn verbosity(ctx: &engine::Context) -> Verbosity {
    Verbosity::from_flags(ctx.quiet, ctx.debug)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod exit_status {
        use super::*;
        use crate::engine::SafetyError;
        use crate::engine::fixtures::StateBuilder;

        #[test]
        fn descriptor_errors_are_invalid() {
            let err = anyhow::Error::new(ReconcileError::Descriptor(DescriptorError::ModeConflict));
            assert_eq!(ExitStatus::for_error(&err), ExitStatus::Invalid);

            let err = anyhow::Error::new(DescriptorError::ModeConflict);
            assert_eq!(ExitStatus::for_error(&err).code(), 2);
        }

        #[test]
        fn safety_refusal_is_refused() {
            let err = anyhow::Error::new(ReconcileError::Safety {
                error: SafetyError::DetachedHead,
                state: Box::new(StateBuilder::detached().build()),
            });
            assert_eq!(ExitStatus::for_error(&err).code(), 3);
        }

        #[test]
        fn other_errors_fail() {
            let err = anyhow::anyhow!("boom");
            assert_eq!(ExitStatus::for_error(&err), ExitStatus::Failed);
        }
    }
}
