//! probe command - Show the observed repository state

use crate::cli::{verbosity, ExitStatus};
use crate::core::types::BranchName;
use crate::engine::{self, Context, ProbeError, ProbeRequest, ReconcileError, Workspace};
use crate::ui::output;
use anyhow::Result;

/// Print the repository state, optionally compared against refs.
pub fn probe(
    ctx: &Context,
    branch: Option<String>,
    pull_from: Option<String>,
    push_to: Option<String>,
    json: bool,
) -> Result<ExitStatus> {
    let branch = branch
        .map(|name| {
            BranchName::new(&name).map_err(|source| ProbeError::InvalidRef {
                refname: name.clone(),
                source,
            })
        })
        .transpose()
        .map_err(ReconcileError::from)?;

    let workspace = Workspace::open(&ctx.base_dir())?;
    let config = workspace.config();
    let request = ProbeRequest {
        branch,
        pull_from,
        push_to,
        include_untracked: config.include_untracked(),
        default_remote: config.remote().to_string(),
    };
    let state = engine::probe(workspace.root(), &request).map_err(ReconcileError::from)?;

    if json {
        output::json(&state)?;
    } else {
        output::print(output::render_state(&state), verbosity(ctx));
    }
    Ok(ExitStatus::Success)
}
