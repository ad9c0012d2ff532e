//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::descriptor::{RawCommitted, RawDescriptor, RawPull, RawPush, RawRequirements};

/// gitensure - Declarative desired-state reconciliation for Git repositories
#[derive(Parser, Debug)]
#[command(name = "gitensure")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gitensure was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile against a descriptor document
    #[command(
        name = "apply",
        long_about = "Reconcile the repository against a descriptor document.\n\n\
            The document is JSON, or TOML when the file name ends in .toml. \
            Its single top-level `verify` or `ensure` block decides whether the \
            repository is only checked or also converged.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Run a descriptor file
    gitensure apply deploy.json

    # Read JSON from stdin
    echo '{\"verify\": {\"checked_out\": true}}' | gitensure apply -

    # Show what ensure would do
    gitensure apply deploy.toml --dry-run"
    )]
    Apply {
        /// Descriptor file, or - for JSON on stdin
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Plan an ensure without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the repository satisfies the given requirements
    #[command(
        name = "verify",
        after_help = "\
WORKFLOW EXAMPLES:
    # Is main checked out and up to date with origin?
    gitensure verify --branch main --checked-out --pull-from origin/main

    # Is everything committed and pushed?
    gitensure verify --commit-message unused --push-to origin/main"
    )]
    Verify {
        #[command(flatten)]
        requirements: RequirementArgs,
    },

    /// Converge the repository to the given requirements
    #[command(
        name = "ensure",
        long_about = "Converge the repository to the given requirements.\n\n\
            Nothing is changed when the repository already complies. Otherwise \
            gitensure plans the minimal actions and runs them one by one, checking \
            the repository after each. History is never rewritten on a remote \
            unless --force or --force-with-lease is given.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Deploy checkout: track origin/prod, rebasing local work
    gitensure ensure --branch master --checked-out --pull-from origin/prod --rebase --autostash

    # Commit and publish whatever is pending
    gitensure ensure --commit-message 'sync' --push-to origin/main

    # Preview first
    gitensure ensure --pull-from origin/main --dry-run"
    )]
    Ensure {
        #[command(flatten)]
        requirements: RequirementArgs,

        /// Print the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the observed repository state
    #[command(name = "probe")]
    Probe {
        /// Branch of interest (default: the checked-out branch)
        #[arg(long)]
        branch: Option<String>,

        /// Compare against this ref as a pull source
        #[arg(long, value_name = "REF")]
        pull_from: Option<String>,

        /// Compare against this ref as a push destination
        #[arg(long, value_name = "REF")]
        push_to: Option<String>,
    },

    /// Inspect configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    gitensure completion bash >> ~/.bashrc

    # Fish
    gitensure completion fish > ~/.config/fish/completions/gitensure.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Requirements given as flags instead of a document.
#[derive(Args, Debug, Clone, Default)]
pub struct RequirementArgs {
    /// Branch the requirements are about (default: the checked-out branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// The branch must be checked out
    #[arg(long)]
    pub checked_out: bool,

    /// The branch must contain every commit of this ref
    #[arg(long, value_name = "REF")]
    pub pull_from: Option<String>,

    /// Integrate --pull-from by rebasing instead of merging
    #[arg(long, requires = "pull_from")]
    pub rebase: bool,

    /// Stash local changes around the rebase
    #[arg(long, requires = "rebase")]
    pub autostash: bool,

    /// The branch must be fully pushed to this ref
    #[arg(long, value_name = "REF")]
    pub push_to: Option<String>,

    /// Allow overwriting the push destination
    #[arg(long, requires = "push_to", conflicts_with = "force_with_lease")]
    pub force: bool,

    /// Allow overwriting the push destination if it is unchanged
    #[arg(long, requires = "push_to")]
    pub force_with_lease: bool,

    /// Require a clean tree; ensure commits pending changes with this message
    #[arg(long, value_name = "MESSAGE")]
    pub commit_message: Option<String>,
}

impl RequirementArgs {
    /// The raw descriptor these flags describe, under `verify` or `ensure`.
    pub fn to_raw(&self, ensure: bool) -> RawDescriptor {
        let requirements = RawRequirements {
            checked_out: self.checked_out,
            pull: self.pull_from.as_ref().map(|from| RawPull {
                from: Some(from.clone()),
                rebase: self.rebase,
                autostash: self.autostash,
            }),
            push: self.push_to.as_ref().map(|to| RawPush {
                to: Some(to.clone()),
                force: self.force,
                force_with_lease: self.force_with_lease,
            }),
            committed: self.commit_message.as_ref().map(|message| RawCommitted {
                message: Some(message.clone()),
            }),
        };

        let (verify, ensure) = if ensure {
            (None, Some(requirements))
        } else {
            (Some(requirements), None)
        };
        RawDescriptor {
            branch: self.branch.clone(),
            verify,
            ensure,
            ..Default::default()
        }
    }
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the merged configuration and where it came from
    Show,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
