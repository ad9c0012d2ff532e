//! git::runner
//!
//! The process-execution collaborator: every mutating git operation is one
//! synchronous invocation of the git binary through [`GitRunner`].
//!
//! # Invariants
//!
//! - Arguments are passed as an argv vector, never through a shell
//! - Terminal prompts are disabled, so a missing credential fails instead
//!   of blocking
//! - A non-zero exit is *not* an error at this layer; callers inspect
//!   [`GitOutput::exit_code`] and decide

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::config::CommitIdentity;

/// Errors from spawning git.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The git binary could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The process was killed by a signal and has no exit code.
    #[error("'{command}' terminated by signal")]
    Signaled { command: String },
}

/// Captured result of one git invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Whether git exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Output indicating a successful invocation with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output indicating a failed invocation with the given stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// The most useful single line of diagnostics.
    pub fn message(&self) -> &str {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        text.lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// Runs git with the given arguments.
///
/// `args` excludes the program name. Implementations must not interpret
/// the arguments through a shell.
pub trait GitRunner {
    fn run(&self, args: &[String]) -> Result<GitOutput, RunnerError>;
}

/// [`GitRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: String,
    workdir: PathBuf,
    identity: Option<CommitIdentity>,
}

impl ProcessRunner {
    /// Run `git` from `PATH` inside `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "git".to_string(),
            workdir: workdir.into(),
            identity: None,
        }
    }

    /// Use a specific git executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Pass `-c user.name=... -c user.email=...` on every invocation.
    pub fn with_identity(mut self, identity: Option<CommitIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.workdir);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        // Stable English diagnostics for conflict and rejection detection.
        cmd.env("LC_ALL", "C");

        if let Some(identity) = &self.identity {
            cmd.arg("-c");
            cmd.arg(format!("user.name={}", identity.name));
            cmd.arg("-c");
            cmd.arg(format!("user.email={}", identity.email));
        }
        cmd
    }
}

impl GitRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<GitOutput, RunnerError> {
        let rendered = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!(command = %rendered, workdir = %self.workdir.display(), "running git");

        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|source| RunnerError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        let exit_code = output
            .status
            .code()
            .ok_or(RunnerError::Signaled { command: rendered })?;
        let result = GitOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(exit_code, "git finished");
        if !result.success() {
            tracing::debug!(stderr = %result.stderr.trim(), "git reported failure");
        }
        Ok(result)
    }
}
