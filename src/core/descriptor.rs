//! core::descriptor
//!
//! The desired-state descriptor: what should be true of a repository.
//!
//! # Shape
//!
//! ```json
//! { "repository": "/srv/app", "branch": "master",
//!   "ensure": { "checked_out": true,
//!               "pull": { "from": "origin/prod", "rebase": true, "autostash": true },
//!               "committed": { "message": "sync" },
//!               "push": { "to": "origin/prod", "force_with_lease": true } } }
//! ```
//!
//! Exactly one of `verify` / `ensure` is given. Documents are decoded into
//! a permissive raw form first, then validated in one pass so that every
//! violated constraint is reported together rather than one at a time.
//!
//! # Example
//!
//! ```
//! use gitensure::core::descriptor::{Descriptor, Mode};
//!
//! let d = Descriptor::from_json(r#"{"branch": "main", "verify": {"checked_out": true}}"#).unwrap();
//! assert_eq!(d.mode(), Mode::Verify);
//! assert!(d.checked_out());
//!
//! let err = Descriptor::from_json(
//!     r#"{"ensure": {"push": {"to": "origin/main", "force": true, "force_with_lease": true},
//!                    "committed": {"message": " "}}}"#,
//! ).unwrap_err();
//! assert_eq!(err.violations().len(), 2);
//! ```

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{BranchName, RefName};

/// Errors from descriptor decoding and validation.
///
/// None of these touch the repository.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// One or more constraints are violated.
    #[error("invalid descriptor: {}", join_violations(.violations))]
    Validation {
        /// Every violated constraint, in document order.
        violations: Vec<Violation>,
    },

    /// Both `verify` and `ensure` were given.
    #[error("'verify' and 'ensure' are mutually exclusive; use 'ensure', which verifies first")]
    ModeConflict,

    /// The document could not be decoded.
    #[error("malformed descriptor ({format}): {message}")]
    Syntax {
        /// "json" or "toml"
        format: &'static str,
        /// Decoder message
        message: String,
    },

    /// The descriptor file could not be read.
    #[error("failed to read descriptor '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DescriptorError {
    /// The violated constraints, empty for non-validation errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            DescriptorError::Validation { violations } => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single violated descriptor constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Neither `verify` nor `ensure` present.
    MissingMode,
    /// `repository` and `path` both given with different values.
    RepositoryConflict { repository: PathBuf, path: PathBuf },
    /// A ref or branch field does not pass refname validation.
    InvalidRef { field: &'static str, reason: String },
    /// `pull` without `from`.
    MissingPullSource,
    /// `push` without `to`.
    MissingPushDestination,
    /// `push.force` together with `push.force_with_lease`.
    ForceModesConflict,
    /// `pull.autostash` without `pull.rebase`.
    AutostashWithoutRebase,
    /// `committed.message` missing or blank.
    EmptyCommitMessage,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingMode => write!(f, "one of 'verify' or 'ensure' is required"),
            Violation::RepositoryConflict { repository, path } => write!(
                f,
                "'repository' ({}) and 'path' ({}) disagree",
                repository.display(),
                path.display()
            ),
            Violation::InvalidRef { field, reason } => write!(f, "{}: {}", field, reason),
            Violation::MissingPullSource => write!(f, "pull.from is required"),
            Violation::MissingPushDestination => write!(f, "push.to is required"),
            Violation::ForceModesConflict => {
                write!(f, "push.force and push.force_with_lease are mutually exclusive")
            }
            Violation::AutostashWithoutRebase => {
                write!(f, "pull.autostash only applies when pull.rebase is true")
            }
            Violation::EmptyCommitMessage => write!(f, "committed.message must not be empty"),
        }
    }
}

/// Raw descriptor document, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawDescriptor {
    pub repository: Option<PathBuf>,
    pub path: Option<PathBuf>,
    pub branch: Option<String>,
    pub verify: Option<RawRequirements>,
    pub ensure: Option<RawRequirements>,
}

/// Raw body of a `verify` / `ensure` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawRequirements {
    pub checked_out: bool,
    pub pull: Option<RawPull>,
    pub push: Option<RawPush>,
    pub committed: Option<RawCommitted>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawPull {
    pub from: Option<String>,
    pub rebase: bool,
    pub autostash: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawPush {
    pub to: Option<String>,
    pub force: bool,
    pub force_with_lease: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawCommitted {
    pub message: Option<String>,
}

/// Whether the caller only checks, or also converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Report compliance, never mutate.
    Verify,
    /// Converge the repository if it is not compliant.
    Ensure,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Verify => f.write_str("verify"),
            Mode::Ensure => f.write_str("ensure"),
        }
    }
}

/// Requested pull behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullSpec {
    from: String,
    rebase: bool,
    autostash: bool,
}

impl PullSpec {
    /// The ref the subject must descend from, as written (`origin/prod`).
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Rebase onto `from` instead of merging it.
    pub fn rebase(&self) -> bool {
        self.rebase
    }

    /// Shelve a dirty tree around the rebase.
    pub fn autostash(&self) -> bool {
        self.autostash
    }
}

/// How a push may treat the destination's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStrategy {
    /// Only fast-forward the destination.
    FastForward,
    /// Overwrite the destination unconditionally.
    Force,
    /// Overwrite only if the destination still matches what was observed.
    ForceWithLease,
}

/// Requested push behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushSpec {
    to: String,
    strategy: PushStrategy,
}

impl PushSpec {
    /// The destination, as written (`origin/prod`).
    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn strategy(&self) -> PushStrategy {
        self.strategy
    }
}

/// Requested commit of pending changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSpec {
    message: String,
}

impl CommitSpec {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A validated desired-state descriptor.
///
/// Parsed once per invocation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    repository: Option<PathBuf>,
    branch: Option<BranchName>,
    mode: Mode,
    checked_out: bool,
    pull: Option<PullSpec>,
    push: Option<PushSpec>,
    committed: Option<CommitSpec>,
}

impl Descriptor {
    /// Validate a raw document.
    ///
    /// # Errors
    ///
    /// - [`DescriptorError::ModeConflict`] if both modes are present
    /// - [`DescriptorError::Validation`] listing every violated constraint
    pub fn parse(raw: RawDescriptor) -> Result<Self, DescriptorError> {
        let (mode, requirements) = match (raw.verify, raw.ensure) {
            (Some(_), Some(_)) => return Err(DescriptorError::ModeConflict),
            (Some(r), None) => (Some(Mode::Verify), r),
            (None, Some(r)) => (Some(Mode::Ensure), r),
            (None, None) => (None, RawRequirements::default()),
        };

        let mut violations = Vec::new();
        if mode.is_none() {
            violations.push(Violation::MissingMode);
        }

        let repository = match (raw.repository, raw.path) {
            (Some(repository), Some(path)) if repository != path => {
                violations.push(Violation::RepositoryConflict { repository, path });
                None
            }
            (repository, path) => repository.or(path),
        };

        let branch = raw.branch.and_then(|name| match BranchName::new(name) {
            Ok(branch) => Some(branch),
            Err(e) => {
                violations.push(Violation::InvalidRef {
                    field: "branch",
                    reason: e.to_string(),
                });
                None
            }
        });

        let pull = requirements
            .pull
            .and_then(|raw| validate_pull(raw, &mut violations));
        let push = requirements
            .push
            .and_then(|raw| validate_push(raw, &mut violations));
        let committed = requirements.committed.and_then(|raw| {
            match raw.message {
                Some(message) if !message.trim().is_empty() => Some(CommitSpec { message }),
                _ => {
                    violations.push(Violation::EmptyCommitMessage);
                    None
                }
            }
        });

        match mode {
            Some(mode) if violations.is_empty() => Ok(Self {
                repository,
                branch,
                mode,
                checked_out: requirements.checked_out,
                pull,
                push,
                committed,
            }),
            _ => Err(DescriptorError::Validation { violations }),
        }
    }

    /// Decode and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, DescriptorError> {
        let raw: RawDescriptor =
            serde_json::from_str(text).map_err(|e| DescriptorError::Syntax {
                format: "json",
                message: e.to_string(),
            })?;
        Self::parse(raw)
    }

    /// Decode and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, DescriptorError> {
        let raw: RawDescriptor = toml::from_str(text).map_err(|e| DescriptorError::Syntax {
            format: "toml",
            message: e.to_string(),
        })?;
        Self::parse(raw)
    }

    /// Read a descriptor file; `.toml` files are TOML, everything else JSON.
    pub fn from_path(path: &Path) -> Result<Self, DescriptorError> {
        let text = fs::read_to_string(path).map_err(|e| DescriptorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Read a JSON descriptor from a stream (stdin).
    pub fn from_reader(mut reader: impl Read) -> Result<Self, DescriptorError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| DescriptorError::Io {
                path: PathBuf::from("-"),
                source: e,
            })?;
        Self::from_json(&text)
    }

    /// Repository path, if the document names one.
    pub fn repository(&self) -> Option<&Path> {
        self.repository.as_deref()
    }

    /// The branch the descriptor is about; `None` means the checked-out one.
    pub fn branch(&self) -> Option<&BranchName> {
        self.branch.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn checked_out(&self) -> bool {
        self.checked_out
    }

    pub fn pull(&self) -> Option<&PullSpec> {
        self.pull.as_ref()
    }

    pub fn push(&self) -> Option<&PushSpec> {
        self.push.as_ref()
    }

    pub fn committed(&self) -> Option<&CommitSpec> {
        self.committed.as_ref()
    }

    /// Same requirements under a different mode.
    ///
    /// Used by `--dry-run` and by callers that verify before ensuring.
    pub fn with_mode(&self, mode: Mode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

/// Validate a ref field that may be `remote/branch` or a bare branch.
fn validate_ref_field(
    field: &'static str,
    value: &str,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    match RefName::new(value) {
        Ok(_) if value.starts_with('-') => {
            violations.push(Violation::InvalidRef {
                field,
                reason: "ref cannot start with '-'".into(),
            });
            None
        }
        Ok(_) => Some(value.to_string()),
        Err(e) => {
            violations.push(Violation::InvalidRef {
                field,
                reason: e.to_string(),
            });
            None
        }
    }
}

fn validate_pull(raw: RawPull, violations: &mut Vec<Violation>) -> Option<PullSpec> {
    if raw.autostash && !raw.rebase {
        violations.push(Violation::AutostashWithoutRebase);
    }
    let from = match raw.from {
        Some(from) => validate_ref_field("pull.from", &from, violations),
        None => {
            violations.push(Violation::MissingPullSource);
            None
        }
    }?;
    Some(PullSpec {
        from,
        rebase: raw.rebase,
        autostash: raw.autostash,
    })
}

fn validate_push(raw: RawPush, violations: &mut Vec<Violation>) -> Option<PushSpec> {
    let strategy = match (raw.force, raw.force_with_lease) {
        (true, true) => {
            violations.push(Violation::ForceModesConflict);
            PushStrategy::ForceWithLease
        }
        (true, false) => PushStrategy::Force,
        (false, true) => PushStrategy::ForceWithLease,
        (false, false) => PushStrategy::FastForward,
    };
    let to = match raw.to {
        Some(to) => validate_ref_field("push.to", &to, violations),
        None => {
            violations.push(Violation::MissingPushDestination);
            None
        }
    }?;
    Some(PushSpec { to, strategy })
}
