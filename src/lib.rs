//! mirrorfleet - bulk clone and mirror engine
//!
//! mirrorfleet clones or refreshes thousands of projects from a code-review
//! server onto local disk with little supervision, and manages the matching
//! repositories on a forge.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the library)
//! - [`core`] - Domain types and configuration
//! - [`credentials`] - Credential file parser and layered credential resolution
//! - [`clone`] - Error classification, retry, and the concurrent clone pool
//! - [`git`] - Single interface for all git operations
//! - [`forge`] - Remote repository hosts and bounded batch operations
//! - [`logging`] - Tracing subscriber setup
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. Every project of a run gets exactly one outcome, whatever happens to the others
//! 2. At most `threads` projects and `max_concurrent` API requests are in flight
//! 3. Authorization failures are never retried and never delete local data
//! 4. Secrets never appear in `Debug`, `Display` or log output

pub mod cli;
pub mod clone;
pub mod core;
pub mod credentials;
pub mod forge;
pub mod git;
pub mod logging;
pub mod ui;
