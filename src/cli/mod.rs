//! cli
//!
//! Command-line interface layer for mirrorfleet.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! handlers in [`commands`], which call the library. This is the only layer
//! that uses `anyhow`.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::logging;
use crate::ui::output::Verbosity;
use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let ctx = commands::Context {
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };
    logging::init(ctx.verbosity);

    commands::dispatch(cli.command, &ctx)
}
