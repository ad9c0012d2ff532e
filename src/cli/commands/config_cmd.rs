//! config command - Show the merged configuration

use serde::Serialize;

use crate::cli::{verbosity, ExitStatus};
use crate::core::config::{CommitIdentity, Config};
use crate::engine::{Context, ReconcileError};
use crate::git::Git;
use crate::ui::output;
use anyhow::Result;

/// Configuration after precedence has been applied.
#[derive(Debug, Serialize)]
struct Effective<'a> {
    remote: &'a str,
    git_binary: &'a str,
    include_untracked: bool,
    verify_hooks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<Identity>,
    sources: Sources,
}

#[derive(Debug, Serialize)]
struct Identity {
    name: String,
    email: String,
}

impl From<CommitIdentity> for Identity {
    fn from(identity: CommitIdentity) -> Self {
        Self {
            name: identity.name,
            email: identity.email,
        }
    }
}

#[derive(Debug, Serialize)]
struct Sources {
    global: Option<String>,
    repo: Option<String>,
}

/// Print the effective configuration and the files it came from.
///
/// Works outside a repository; only global configuration applies there.
pub fn show(ctx: &Context, json: bool) -> Result<ExitStatus> {
    let root = Git::open(&ctx.base_dir())
        .ok()
        .and_then(|git| git.work_dir().ok().map(|p| p.to_path_buf()));
    let config = Config::load(root.as_deref())
        .map_err(ReconcileError::from)?
        .config;

    let effective = Effective {
        remote: config.remote(),
        git_binary: config.git_binary(),
        include_untracked: config.include_untracked(),
        verify_hooks: config.verify_hooks(),
        commit: config.commit_identity().map(Identity::from),
        sources: Sources {
            global: config
                .global_config_loaded_from()
                .map(|p| p.display().to_string()),
            repo: config
                .repo_config_loaded_from()
                .map(|p| p.display().to_string()),
        },
    };

    if json {
        output::json(&effective)?;
    } else {
        output::print(toml::to_string_pretty(&effective)?.trim_end(), verbosity(ctx));
    }
    Ok(ExitStatus::Success)
}
