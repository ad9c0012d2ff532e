//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Builds a descriptor (from a document or from flags)
//! 2. Calls the engine
//! 3. Formats and displays output, returning the exit status
//!
//! Handlers do NOT perform repository mutations directly.

mod apply;
mod completion;
mod config_cmd;
mod probe;
mod reconcile;

pub use apply::apply;
pub use completion::completion;
pub use config_cmd::show as config_show;
pub use probe::probe;
pub use reconcile::{ensure, verify};

use crate::cli::args::{Command, ConfigAction};
use crate::cli::{verbosity, ExitStatus};
use crate::engine::{Context, Outcome};
use crate::ui::output;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context, json: bool) -> Result<ExitStatus> {
    match command {
        Command::Apply { file, dry_run } => apply::apply(ctx, &file, dry_run, json),
        Command::Verify { requirements } => reconcile::verify(ctx, &requirements, json),
        Command::Ensure {
            requirements,
            dry_run,
        } => reconcile::ensure(ctx, &requirements, dry_run, json),
        Command::Probe {
            branch,
            pull_from,
            push_to,
        } => probe::probe(ctx, branch, pull_from, push_to, json),
        Command::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(ctx, json),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Print an outcome and map it to an exit status.
pub(crate) fn present(outcome: &Outcome, ctx: &Context, json: bool) -> Result<ExitStatus> {
    if json {
        output::json(outcome)?;
    } else {
        let verbosity = verbosity(ctx);
        output::print(output::render_outcome(outcome), verbosity);
        for warning in &outcome.warnings {
            output::warn(warning, verbosity);
        }
        if ctx.quiet && !outcome.passed {
            for failure in &outcome.failures {
                output::error(failure);
            }
        }
    }

    Ok(if outcome.passed {
        ExitStatus::Success
    } else {
        ExitStatus::Failed
    })
}
