//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All output goes through this module so quiet and JSON modes are honored
//! in one place. Logs go to stderr through `tracing`; this module owns stdout.

pub mod output;
