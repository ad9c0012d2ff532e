//! apply command - Reconcile against a descriptor document

use std::path::Path;

use crate::cli::ExitStatus;
use crate::core::descriptor::{Descriptor, DescriptorError};
use crate::engine::{self, Context, ReconcileError};
use anyhow::Result;

/// Load a descriptor from `file`, or JSON from stdin for `-`.
pub(crate) fn load(ctx: &Context, file: &Path) -> Result<Descriptor, DescriptorError> {
    if file == Path::new("-") {
        return Descriptor::from_reader(std::io::stdin().lock());
    }
    let path = if file.is_relative() {
        ctx.base_dir().join(file)
    } else {
        file.to_path_buf()
    };
    Descriptor::from_path(&path)
}

/// Reconcile against the descriptor in `file`.
pub fn apply(ctx: &Context, file: &Path, dry_run: bool, json: bool) -> Result<ExitStatus> {
    let descriptor = load(ctx, file).map_err(ReconcileError::from)?;
    tracing::debug!(file = %file.display(), mode = %descriptor.mode(), dry_run, "applying descriptor");

    let outcome = if dry_run {
        engine::dry_run(&descriptor, ctx)?
    } else {
        engine::reconcile(&descriptor, ctx)?
    };
    super::present(&outcome, ctx, json)
}
