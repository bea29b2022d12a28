//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output respects the quiet flag. Rendering is split from printing so the
//! summary text can be tested without capturing stdout.

use std::fmt::Display;
use std::fmt::Write as _;

use crate::core::types::{BatchResult, CloneStatus};
use crate::forge::BatchItemResult;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - failures only
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - every project listed
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

/// Render the end-of-run report.
///
/// Quiet shows only failures. Normal adds the totals line. Debug also lists
/// every project with its status and attempt count.
pub fn render_summary(batch: &BatchResult, verbosity: Verbosity) -> String {
    let mut out = String::new();

    if verbosity != Verbosity::Quiet {
        let _ = writeln!(
            out,
            "{} projects: {} cloned, {} refreshed, {} skipped, {} failed ({:.1}% success)",
            batch.total_count(),
            batch.success_count(),
            batch.refreshed_count(),
            batch.skipped_count(),
            batch.failed_count(),
            batch.success_rate(),
        );
        if let Some(duration) = batch.duration() {
            let _ = writeln!(out, "run {} took {}s", batch.run_id, duration.num_seconds());
        }
    }

    if verbosity == Verbosity::Debug {
        for outcome in batch.sorted_outcomes() {
            let _ = writeln!(
                out,
                "  {:<9} {} (attempts: {})",
                outcome.status.to_string(),
                outcome.project,
                outcome.attempts
            );
        }
    }

    let failures = batch
        .sorted_outcomes()
        .into_iter()
        .filter(|o| o.status == CloneStatus::Failed)
        .collect::<Vec<_>>();
    if !failures.is_empty() {
        let _ = writeln!(out, "failed:");
        for outcome in failures {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            let _ = writeln!(out, "  {}", outcome.project);
            for line in error.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }

    out
}

/// Render per-item results of a remote batch, one line each.
pub fn render_batch_items<T>(operation: &str, items: &[BatchItemResult<T>]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = match item.error() {
            None => writeln!(out, "{} {}: ok", operation, item.name),
            Some(error) => writeln!(out, "{} {}: FAILED {}", operation, item.name, error),
        };
    }
    let failed = items.iter().filter(|i| !i.is_success()).count();
    let _ = writeln!(out, "{} of {} succeeded", items.len() - failed, items.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CloneOutcome;
    use std::path::PathBuf;
    use std::time::Duration;

    fn outcome(project: &str, status: CloneStatus, error: Option<&str>) -> CloneOutcome {
        CloneOutcome {
            project: project.into(),
            status,
            attempts: 1,
            error: error.map(String::from),
            elapsed: Duration::ZERO,
            path: PathBuf::from(project),
            head: None,
        }
    }

    fn sample() -> BatchResult {
        let mut batch = BatchResult::start();
        batch.record(outcome("b", CloneStatus::Success, None));
        batch.record(outcome(
            "a",
            CloneStatus::Failed,
            Some("SSH authentication failed for a\n  - Check your SSH key"),
        ));
        batch.seal();
        batch
    }

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn normal_summary_has_totals_and_failures() {
        let text = render_summary(&sample(), Verbosity::Normal);
        assert!(text.contains("2 projects: 1 cloned, 0 refreshed, 0 skipped, 1 failed (50.0% success)"));
        assert!(text.contains("failed:\n  a\n    SSH authentication failed for a\n      - Check your SSH key"));
        assert!(!text.contains("(attempts:"));
    }

    #[test]
    fn quiet_summary_only_failures() {
        let text = render_summary(&sample(), Verbosity::Quiet);
        assert!(text.starts_with("failed:"));
    }

    #[test]
    fn debug_summary_lists_projects_by_name() {
        let text = render_summary(&sample(), Verbosity::Debug);
        let a = text.find("failed    a").unwrap();
        let b = text.find("success   b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn batch_items_rendered() {
        let items = vec![
            BatchItemResult {
                name: "x".to_string(),
                result: Ok(()),
            },
            BatchItemResult {
                name: "y".to_string(),
                result: Err("API error: 403 - nope".to_string()),
            },
        ];
        let text = render_batch_items("delete", &items);
        assert!(text.contains("delete x: ok"));
        assert!(text.contains("delete y: FAILED API error: 403 - nope"));
        assert!(text.ends_with("1 of 2 succeeded\n"));
    }
}
