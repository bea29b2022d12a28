//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing and run summaries
//!
//! # Design
//!
//! Everything meant for the operator goes through this module. Diagnostics
//! meant for debugging go through `tracing` instead (see [`crate::logging`]).

pub mod output;
