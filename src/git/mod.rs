//! git
//!
//! The crate's only doorway to git.
//!
//! # Architecture
//!
//! Three parts:
//!
//! - [`runner`]: clone and refresh run the `git` executable through the
//!   [`GitRunner`] trait (tokio subprocess, per-invocation timeout)
//! - [`repo`]: local inspection of existing clones through `git2`
//! - [`scripted`]: a scripted [`GitRunner`] for tests
//!
//! No other module imports `git2` or spawns `git`.
//!
//! # Example
//!
//! ```ignore
//! use mirrorfleet::git::{GitInvocation, GitRunner, ProcessGitRunner};
//! use std::time::Duration;
//!
//! let runner = ProcessGitRunner::new();
//! let out = runner
//!     .run(&GitInvocation::new(vec!["--version".into()], Duration::from_secs(5)))
//!     .await?;
//! assert!(out.success);
//! ```

pub mod repo;
pub mod runner;
pub mod scripted;

pub use repo::LocalRepo;
pub use runner::{GitInvocation, GitOutput, GitRunner, ProcessGitRunner};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Path is not the root of a git repository.
    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    /// The git executable could not be started or awaited.
    #[error("failed to run {}: {message}", .program.display())]
    Spawn { program: PathBuf, message: String },

    /// The invocation exceeded its timeout and was killed.
    #[error("git {subcommand} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        subcommand: String,
        timeout: Duration,
    },

    /// Any other failure inside git handling.
    #[error("git error: {message}")]
    Internal { message: String },
}
