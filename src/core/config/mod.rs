//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Example
//!
//! ```no_run
//! use gitensure::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/repo"))).unwrap();
//! let config = result.config;
//! println!("default remote: {}", config.remote());
//! ```

pub mod schema;

pub use schema::{CommitIdentityConfig, GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Commit identity with both fields resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `repo_path` is provided, also loads repo-specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(repo_path: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let (global, global_path) = match Self::global_candidates()
            .into_iter()
            .find(|p| p.exists())
        {
            Some(path) => (read_toml::<GlobalConfig>(&path)?, Some(path)),
            None => (GlobalConfig::default(), None),
        };

        let (repo, repo_path_found) = match repo_path.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(read_toml::<RepoConfig>(&path)?), Some(path)),
            _ => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        tracing::debug!(
            global = ?global_path,
            repo = ?repo_path_found,
            "configuration loaded"
        );

        Ok(ConfigLoadResult {
            config: Config {
                global,
                repo,
                global_path,
                repo_path: repo_path_found,
            },
        })
    }

    /// Global config locations, in search order.
    fn global_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var("GITENSURE_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("gitensure/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".gitensure/config.toml"));
        }
        candidates
    }

    /// Get the canonical path for repo config.
    ///
    /// Returns `.git/gitensure/config.toml` relative to the given work tree.
    pub fn repo_config_path(repo_path: &Path) -> PathBuf {
        repo_path.join(".git/gitensure/config.toml")
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Remote used when a push destination has no remote prefix.
    ///
    /// Defaults to "origin" if not configured.
    pub fn remote(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.remote.as_deref())
            .unwrap_or("origin")
    }

    /// The git executable. Defaults to "git".
    pub fn git_binary(&self) -> &str {
        self.global.git_binary.as_deref().unwrap_or("git")
    }

    /// Whether untracked files make the tree dirty. Defaults to `true`.
    pub fn include_untracked(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.include_untracked)
            .or(self.global.include_untracked)
            .unwrap_or(true)
    }

    /// Whether commit hooks run. Defaults to `true`.
    pub fn verify_hooks(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.verify_hooks)
            .or(self.global.verify_hooks)
            .unwrap_or(true)
    }

    /// Explicit commit identity, if configured in either scope.
    pub fn commit_identity(&self) -> Option<CommitIdentity> {
        let section = self
            .repo
            .as_ref()
            .and_then(|r| r.commit.as_ref())
            .or(self.global.commit.as_ref())?;
        match (&section.name, &section.email) {
            (Some(name), Some(email)) => Some(CommitIdentity {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
