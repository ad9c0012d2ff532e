//! git
//!
//! The two doorways to Git.
//!
//! # Architecture
//!
//! - [`Git`] reads repository state through `git2`. No other module
//!   imports `git2`.
//! - [`GitRunner`] performs mutations by invoking the git binary, one
//!   synchronous process per operation. Fetch, rebase, merge, commit and
//!   push all go through it so that hooks, credential helpers and the
//!   user's git configuration behave exactly as on the command line.
//!
//! # Invariants
//!
//! - Reads never mutate; mutations never go through git2
//! - All reads return strong types (Oid, BranchName)
//!
//! # Example
//!
//! ```ignore
//! use gitensure::git::{Git, GitRunner, ProcessRunner};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! println!("on {}", git.current_ref()?);
//!
//! let runner = ProcessRunner::new(git.work_dir()?);
//! let out = runner.run(&["fetch".into(), "origin".into()])?;
//! assert!(out.success());
//! ```

mod interface;
pub mod runner;

pub use interface::{CurrentRef, Git, GitError, GitState, WorktreeStatus};
pub use runner::{GitOutput, GitRunner, ProcessRunner, RunnerError};
