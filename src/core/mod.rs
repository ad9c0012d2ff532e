//! core
//!
//! Domain types, the desired-state descriptor, and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName, RefTarget
//! - [`descriptor`] - The desired-state descriptor and its validation
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here touches a repository

pub mod config;
pub mod descriptor;
pub mod types;
