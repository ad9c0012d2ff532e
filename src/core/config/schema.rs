//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GITENSURE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitensure/config.toml`
//! 3. `~/.gitensure/config.toml`
//!
//! # Repo Config
//!
//! Located at `.git/gitensure/config.toml`.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// git_binary = "/usr/bin/git"
/// verify_hooks = true
/// include_untracked = true
///
/// [commit]
/// name = "Deploy Bot"
/// email = "deploy@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Path or name of the git executable
    pub git_binary: Option<String>,

    /// Run commit hooks (false passes --no-verify)
    pub verify_hooks: Option<bool>,

    /// Count untracked files as pending changes
    pub include_untracked: Option<bool>,

    /// Identity for commits created by reconciliation
    pub commit: Option<CommitIdentityConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(binary) = &self.git_binary {
            if binary.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "git_binary cannot be empty".to_string(),
                ));
            }
        }
        if let Some(identity) = &self.commit {
            identity.validate()?;
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "upstream"
/// include_untracked = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote used for push destinations without a remote prefix (default: "origin")
    pub remote: Option<String>,

    /// Count untracked files as pending changes (overrides global)
    pub include_untracked: Option<bool>,

    /// Run commit hooks (overrides global)
    pub verify_hooks: Option<bool>,

    /// Commit identity (overrides global)
    pub commit: Option<CommitIdentityConfig>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() || remote.contains('/') || remote.starts_with('-') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid remote name '{}'",
                    remote
                )));
            }
        }
        if let Some(identity) = &self.commit {
            identity.validate()?;
        }
        Ok(())
    }
}

/// Author/committer identity passed to git with `-c user.name/-c user.email`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CommitIdentityConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CommitIdentityConfig {
    /// Both fields must be set together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) if !name.trim().is_empty() && email.contains('@') => Ok(()),
            (None, None) => Ok(()),
            _ => Err(ConfigError::InvalidValue(
                "commit identity needs both a name and an email address".to_string(),
            )),
        }
    }
}
