//! logging
//!
//! Diagnostic tracing to stderr.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: per-project attempts, backoff delays,
//!   credential sources and API failures, filtered by `RUST_LOG`.
//! - **Run summary ([`crate::ui::output`])**: the user-facing report on
//!   stdout, shaped by `--quiet` / `--debug` only.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ui::output::Verbosity;

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Debug => "debug",
    }
}

/// Install the global subscriber.
///
/// Reads `RUST_LOG`; falls back to [`default_directive`]. A second call is
/// a no-op.
///
/// # Example
/// ```bash
/// RUST_LOG=mirrorfleet::clone=debug mfleet clone --host gerrit.example.org
/// ```
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
