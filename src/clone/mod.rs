//! clone
//!
//! Bulk clone orchestration.
//!
//! # Modules
//!
//! - [`classify`] - Retry and cleanup decisions over git error text
//! - [`retry`] - Generic bounded retry with exponential backoff
//! - [`command`] - Clone/refresh argument vectors and source URLs
//! - [`pool`] - Concurrent worker pool producing a `BatchResult`
//! - [`manifest`] - JSON manifest of a finished run
//!
//! # Invariants
//!
//! - Exactly one outcome per project, whatever happens to the others
//! - At most `threads` projects in progress at once
//! - Authorization failures are never retried and never cleaned up

pub mod classify;
pub mod command;
pub mod manifest;
pub mod pool;
pub mod retry;

pub use classify::{diagnose, is_retryable, should_cleanup, FailureClass};
pub use pool::{run_credentials, CancelToken, ClonePool};
pub use retry::{retry, retry_until, Attempted, RetryError};
