//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls into the library (`clone`, `forge`) to do the work
//! 3. Formats and displays output through [`crate::ui::output`]
//!
//! # Async Commands
//!
//! `clone` and `remote` do network I/O. Their handlers build a tokio
//! runtime and `block_on` the async work, keeping dispatch synchronous.

mod clone;
mod completion;
mod remote;

pub use clone::{clone, parse_project_list};
pub use completion::completion;
pub use remote::{remote, GITHUB_TOKEN_ENV};

use crate::cli::args::Command;
use crate::ui::output::Verbosity;
use anyhow::{Context as _, Result};

/// Settings shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub verbosity: Verbosity,
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Clone(args) => clone::clone(ctx, args),
        Command::Remote { command } => remote::remote(ctx, command),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Runtime for handlers that do async work.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
