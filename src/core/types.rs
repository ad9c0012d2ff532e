//! core::types
//!
//! Strong types for the git concepts the reconciler reasons about.
//!
//! # Types
//!
//! - [`BranchName`] - Validated local branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated fully-qualified reference name
//! - [`RefTarget`] - A descriptor ref (`pull.from`, `push.to`) classified as
//!   local branch or remote-tracking branch
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! Construction validates against `git check-ref-format` rules, so an
//! invalid name can never reach a git invocation.
//!
//! ```
//! use gitensure::core::types::{BranchName, Oid, RefName, RefTarget};
//!
//! let branch = BranchName::new("release/1.x").unwrap();
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/release/1.x");
//!
//! let target = RefTarget::remote("origin", BranchName::new("prod").unwrap());
//! assert_eq!(target.refname().as_str(), "refs/remotes/origin/prod");
//!
//! assert!(BranchName::new("bad..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Characters git forbids anywhere in a ref name.
const FORBIDDEN_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Check `name` against the shared refname rules.
///
/// Returns a description of the first broken rule. `what` names the thing
/// being validated in the message ("branch name", "ref name").
fn check_ref_syntax(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name == "@" {
        return Err(format!("{what} cannot be '@' (reserved)"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(format!("{what} cannot start or end with '/'"));
    }
    if name.ends_with('.') {
        return Err(format!("{what} cannot end with '.'"));
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Err(format!("{what} cannot contain '{bad}'"));
        }
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(format!("{what} cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(format!("{what} cannot contain control characters"));
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }
    Ok(())
}

/// A validated Git branch name (the part after `refs/heads/`).
///
/// ```
/// use gitensure::core::types::BranchName;
///
/// let name = BranchName::new("feature/login").unwrap();
/// assert_eq!(name.as_str(), "feature/login");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-flag").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        // A leading '-' would be parsed as an option by the git binary.
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        check_ref_syntax(&name, "branch name").map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// ```
/// use gitensure::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex string.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID (at most `len` characters).
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, fully-qualified Git reference name.
///
/// ```
/// use gitensure::core::types::{BranchName, RefName};
///
/// let main = BranchName::new("main").unwrap();
/// assert_eq!(RefName::for_branch(&main).as_str(), "refs/heads/main");
/// assert_eq!(
///     RefName::for_remote_branch("origin", &main).as_str(),
///     "refs/remotes/origin/main"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_ref_syntax(&name, "ref name").map_err(TypeError::InvalidRefName)?;
        Ok(Self(name))
    }

    /// `refs/heads/<branch>`.
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// `refs/remotes/<remote>/<branch>`.
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A descriptor ref after classification against the repository's remotes.
///
/// `origin/prod` becomes `Remote { remote: "origin", branch: "prod" }` when
/// `origin` is a configured remote; otherwise the whole string is a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefTarget {
    /// A local branch (`refs/heads/<branch>`).
    Local {
        /// Branch name.
        branch: BranchName,
    },
    /// A branch on a remote, observed through `refs/remotes/<remote>/<branch>`.
    Remote {
        /// Remote name.
        remote: String,
        /// Branch name on the remote.
        branch: BranchName,
    },
}

impl RefTarget {
    /// Local branch target.
    pub fn local(branch: BranchName) -> Self {
        Self::Local { branch }
    }

    /// Remote branch target.
    pub fn remote(remote: impl Into<String>, branch: BranchName) -> Self {
        Self::Remote {
            remote: remote.into(),
            branch,
        }
    }

    /// The local ref the probe reads for this target.
    pub fn refname(&self) -> RefName {
        match self {
            Self::Local { branch } => RefName::for_branch(branch),
            Self::Remote { remote, branch } => RefName::for_remote_branch(remote, branch),
        }
    }

    /// The branch part of the target.
    pub fn branch(&self) -> &BranchName {
        match self {
            Self::Local { branch } | Self::Remote { branch, .. } => branch,
        }
    }

    /// The remote name, for remote-tracking targets.
    pub fn remote_name(&self) -> Option<&str> {
        match self {
            Self::Local { .. } => None,
            Self::Remote { remote, .. } => Some(remote),
        }
    }
}

impl std::fmt::Display for RefTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { branch } => write!(f, "{}", branch),
            Self::Remote { remote, branch } => write!(f, "{}/{}", remote, branch),
        }
    }
}

/// A UTC timestamp serialized in RFC3339 format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
