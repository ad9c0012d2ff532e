//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, the [`Outcome`] itself is printed as JSON and
//! nothing else goes to stdout.

use std::fmt::Display;
use std::fmt::Write as _;

use serde::Serialize;

use crate::engine::{ActionStatus, Outcome, RepositoryState};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print any serializable value as pretty JSON on stdout.
pub fn json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_label(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Applied => "applied",
        ActionStatus::Failed => "FAILED",
        ActionStatus::Skipped => "skipped",
        ActionStatus::Unwound => "unwound",
        ActionStatus::Planned => "planned",
    }
}

/// One-line verdict for an outcome.
pub fn headline(outcome: &Outcome) -> &'static str {
    match (outcome.passed, outcome.changed, outcome.dry_run) {
        (_, _, true) if outcome.actions.is_empty() => "Already compliant",
        (_, _, true) => "Would apply",
        (true, true, _) => "Converged",
        (true, false, _) => "Compliant",
        (false, _, _) if outcome.conflicted => "Stopped on conflict",
        (false, _, _) => "Not compliant",
    }
}

/// Human-readable rendering of an outcome.
pub fn render_outcome(outcome: &Outcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}, on {})",
        headline(outcome),
        outcome.mode,
        outcome.final_state.current_ref
    );

    if !outcome.actions.is_empty() {
        let _ = writeln!(out);
        for (i, record) in outcome.actions.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {:<8} {}",
                i + 1,
                status_label(record.status),
                record.action
            );
        }
    }

    if !outcome.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", format_list(&outcome.failures, "  - "));
    }

    if outcome.conflicted {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Operation left in progress ({}). Resolve conflicts in:",
            outcome.final_state.operation
        );
        let _ = writeln!(out, "{}", format_list(&outcome.final_state.conflicts, "    "));
    }

    out.trim_end().to_string()
}

/// Human-readable rendering of a probe snapshot.
pub fn render_state(state: &RepositoryState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "HEAD:       {}", state.current_ref);
    if let Some(head) = &state.head_oid {
        let _ = writeln!(out, "Commit:     {}", head.short(12));
    }
    let _ = writeln!(
        out,
        "Worktree:   {}",
        if state.is_dirty { "dirty" } else { "clean" }
    );
    let _ = writeln!(
        out,
        "Upstream:   {}",
        state.upstream.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(out, "Operation:  {}", state.operation);
    if !state.conflicts.is_empty() {
        let _ = writeln!(out, "Conflicts:\n{}", format_list(&state.conflicts, "    "));
    }
    if state.stash_depth > 0 {
        let _ = writeln!(out, "Stashes:    {}", state.stash_depth);
    }
    for (label, divergence) in [("Pull from", &state.pull), ("Push to", &state.push)] {
        if let Some(d) = divergence {
            if d.exists {
                let _ = writeln!(
                    out,
                    "{:<11} {} ({} ahead, {} behind)",
                    format!("{}:", label),
                    d.target,
                    d.ahead,
                    d.behind
                );
            } else if label == "Pull from" {
                let _ = writeln!(out, "{:<11} {} (not fetched)", format!("{}:", label), d.target);
            } else {
                let _ = writeln!(
                    out,
                    "{:<11} {} (does not exist, {} to push)",
                    format!("{}:", label),
                    d.target,
                    d.ahead
                );
            }
        }
    }
    out.trim_end().to_string()
}
