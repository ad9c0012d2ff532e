//! verify / ensure commands - Reconcile against requirements given as flags

use crate::cli::args::RequirementArgs;
use crate::cli::ExitStatus;
use crate::core::descriptor::Descriptor;
use crate::engine::{self, Context, ReconcileError};
use anyhow::Result;

fn descriptor(requirements: &RequirementArgs, ensure: bool) -> Result<Descriptor, ReconcileError> {
    Ok(Descriptor::parse(requirements.to_raw(ensure))?)
}

/// Check the repository; never mutates.
pub fn verify(ctx: &Context, requirements: &RequirementArgs, json: bool) -> Result<ExitStatus> {
    let descriptor = descriptor(requirements, false)?;
    let outcome = engine::reconcile(&descriptor, ctx)?;
    super::present(&outcome, ctx, json)
}

/// Converge the repository, or preview the plan with `dry_run`.
pub fn ensure(
    ctx: &Context,
    requirements: &RequirementArgs,
    dry_run: bool,
    json: bool,
) -> Result<ExitStatus> {
    let descriptor = descriptor(requirements, true)?;
    let outcome = if dry_run {
        engine::dry_run(&descriptor, ctx)?
    } else {
        engine::reconcile(&descriptor, ctx)?
    };
    super::present(&outcome, ctx, json)
}
