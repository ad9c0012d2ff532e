//! gitensure - Declarative desired-state reconciliation for Git repositories
//!
//! A descriptor states what should be true of a local repository: a branch
//! checked out, descended from some ref, committed, pushed. gitensure either
//! verifies that it is true or makes it true with the fewest git operations,
//! and does nothing when it already holds.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Orchestrates Probe → Decide → Execute → Report
//! - [`core`] - Domain types, the descriptor, and configuration
//! - [`git`] - Repository reads (git2) and the git process runner
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. Verify never mutates the repository
//! 2. A compliant repository is never touched under ensure
//! 3. Remote history is only rewritten when the descriptor allows it
//! 4. A conflict stops execution and leaves the operation for a human

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
