//! core::types
//!
//! Domain types for a bulk clone run.
//!
//! # Types
//!
//! - [`Project`] - A remote project to clone, as produced by discovery
//! - [`ProjectState`] - Lifecycle state reported by the review server
//! - [`CloneStatus`] - Terminal status of one project in a run
//! - [`CloneOutcome`] - Per-project result record
//! - [`BatchResult`] - Aggregate of every outcome in a run
//!
//! # Lifecycle
//!
//! A `BatchResult` is created when a run starts, receives outcomes as they
//! land, and is sealed once the last outcome arrives. Counters are kept in
//! step with the outcome list so the aggregate is consistent at any point.
//!
//! # Example
//!
//! ```
//! use mirrorfleet::core::types::{BatchResult, CloneOutcome, CloneStatus};
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let mut batch = BatchResult::start();
//! batch.record(CloneOutcome {
//!     project: "tools/build".to_string(),
//!     status: CloneStatus::Success,
//!     attempts: 1,
//!     error: None,
//!     elapsed: Duration::from_millis(1200),
//!     path: PathBuf::from("/srv/mirror/tools/build"),
//!     head: None,
//! });
//! batch.seal();
//!
//! assert_eq!(batch.total_count(), 1);
//! assert_eq!(batch.success_rate(), 100.0);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a project on the review server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    /// Open for changes
    Active,
    /// Archived; readable but no longer accepting changes
    ReadOnly,
    /// Hidden from regular listings
    Hidden,
}

impl ProjectState {
    /// Whether the project counts as archived for filtering purposes.
    pub fn is_archived(self) -> bool {
        match self {
            ProjectState::Active => false,
            ProjectState::ReadOnly | ProjectState::Hidden => true,
        }
    }
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectState::Active => write!(f, "ACTIVE"),
            ProjectState::ReadOnly => write!(f, "READ_ONLY"),
            ProjectState::Hidden => write!(f, "HIDDEN"),
        }
    }
}

/// A remote project to be cloned.
///
/// Projects are produced by discovery outside this crate and are read-only
/// for the duration of a run. Names are unique within a run and may contain
/// `/` separators, which map to nested directories on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    /// Server-side project name (e.g. `ccsdk/apps`)
    pub name: String,
    /// Lifecycle state
    pub state: ProjectState,
}

impl Project {
    /// Create an active project.
    pub fn active(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ProjectState::Active,
        }
    }

    /// Create a project with an explicit state.
    pub fn new(name: impl Into<String>, state: ProjectState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

/// Terminal status of one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloneStatus {
    /// Fresh clone completed
    Success,
    /// Clone or refresh failed after retries (or immediately, if not retryable)
    Failed,
    /// Not attempted (archived filtering or cancellation)
    Skipped,
    /// An existing local clone was brought up to date
    Refreshed,
}

impl std::fmt::Display for CloneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloneStatus::Success => write!(f, "success"),
            CloneStatus::Failed => write!(f, "failed"),
            CloneStatus::Skipped => write!(f, "skipped"),
            CloneStatus::Refreshed => write!(f, "refreshed"),
        }
    }
}

/// Result of processing a single project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneOutcome {
    /// Project name
    pub project: String,
    /// Terminal status
    pub status: CloneStatus,
    /// Number of attempts made (0 when skipped)
    pub attempts: u32,
    /// Diagnostic for failed or skipped projects
    pub error: Option<String>,
    /// Wall-clock time spent on the project
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Destination path on disk
    pub path: PathBuf,
    /// Commit HEAD points at after a successful clone or refresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
}

impl CloneOutcome {
    /// Outcome for a project that was never attempted.
    pub fn skipped(project: impl Into<String>, path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            status: CloneStatus::Skipped,
            attempts: 0,
            error: Some(reason.into()),
            elapsed: Duration::ZERO,
            path,
            head: None,
        }
    }

    /// Whether this outcome counts as a failure.
    pub fn is_failure(&self) -> bool {
        self.status == CloneStatus::Failed
    }
}

/// Aggregate result of a bulk clone run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Unique identifier of the run
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the last outcome landed (`None` while running)
    pub completed_at: Option<DateTime<Utc>>,
    total_count: usize,
    success_count: usize,
    failed_count: usize,
    skipped_count: usize,
    refreshed_count: usize,
    /// Outcomes in landing order
    outcomes: Vec<CloneOutcome>,
}

impl BatchResult {
    /// Start a new, empty batch stamped with the current time.
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            total_count: 0,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            refreshed_count: 0,
            outcomes: Vec::new(),
        }
    }

    /// Append an outcome and update the counters.
    pub fn record(&mut self, outcome: CloneOutcome) {
        self.total_count += 1;
        match outcome.status {
            CloneStatus::Success => self.success_count += 1,
            CloneStatus::Failed => self.failed_count += 1,
            CloneStatus::Skipped => self.skipped_count += 1,
            CloneStatus::Refreshed => self.refreshed_count += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Stamp the completion time. Sealing twice keeps the first timestamp.
    pub fn seal(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Whether the batch has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    pub fn refreshed_count(&self) -> usize {
        self.refreshed_count
    }

    /// Percentage of projects that cloned successfully; 0 for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_count as f64 * 100.0
        }
    }

    /// Outcomes in the order they landed.
    pub fn outcomes(&self) -> &[CloneOutcome] {
        &self.outcomes
    }

    /// Outcomes sorted by project name.
    pub fn sorted_outcomes(&self) -> Vec<&CloneOutcome> {
        let mut sorted: Vec<&CloneOutcome> = self.outcomes.iter().collect();
        sorted.sort_by(|a, b| a.project.cmp(&b.project));
        sorted
    }

    /// Look up the outcome for a project.
    pub fn outcome(&self, project: &str) -> Option<&CloneOutcome> {
        self.outcomes.iter().find(|o| o.project == project)
    }

    /// Wall-clock duration of the run, if sealed.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

/// Serialize durations as fractional seconds in the manifest.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: CloneStatus) -> CloneOutcome {
        CloneOutcome {
            project: name.to_string(),
            status,
            attempts: 1,
            error: None,
            elapsed: Duration::from_millis(10),
            path: PathBuf::from("/tmp").join(name),
            head: None,
        }
    }

    mod project_state {
        use super::*;

        #[test]
        fn archived_states() {
            assert!(!ProjectState::Active.is_archived());
            assert!(ProjectState::ReadOnly.is_archived());
            assert!(ProjectState::Hidden.is_archived());
        }

        #[test]
        fn serde_uses_server_names() {
            let json = serde_json::to_string(&ProjectState::ReadOnly).unwrap();
            assert_eq!(json, "\"READ_ONLY\"");
            let parsed: ProjectState = serde_json::from_str("\"HIDDEN\"").unwrap();
            assert_eq!(parsed, ProjectState::Hidden);
        }
    }

    mod batch_result {
        use super::*;

        #[test]
        fn empty_batch_has_zero_rate() {
            let batch = BatchResult::start();
            assert_eq!(batch.total_count(), 0);
            assert_eq!(batch.success_rate(), 0.0);
            assert!(!batch.is_sealed());
        }

        #[test]
        fn counters_track_statuses() {
            let mut batch = BatchResult::start();
            batch.record(outcome("a", CloneStatus::Success));
            batch.record(outcome("b", CloneStatus::Failed));
            batch.record(outcome("c", CloneStatus::Skipped));
            batch.record(outcome("d", CloneStatus::Refreshed));

            assert_eq!(batch.total_count(), 4);
            assert_eq!(batch.success_count(), 1);
            assert_eq!(batch.failed_count(), 1);
            assert_eq!(batch.skipped_count(), 1);
            assert_eq!(batch.refreshed_count(), 1);
            assert_eq!(batch.success_rate(), 25.0);
        }

        #[test]
        fn seal_is_idempotent() {
            let mut batch = BatchResult::start();
            batch.seal();
            let first = batch.completed_at;
            batch.seal();
            assert_eq!(batch.completed_at, first);
            assert!(batch.duration().is_some());
        }

        #[test]
        fn sorted_outcomes_by_name() {
            let mut batch = BatchResult::start();
            batch.record(outcome("zeta", CloneStatus::Success));
            batch.record(outcome("alpha", CloneStatus::Success));
            let names: Vec<_> = batch
                .sorted_outcomes()
                .iter()
                .map(|o| o.project.as_str())
                .collect();
            assert_eq!(names, vec!["alpha", "zeta"]);
            assert_eq!(batch.outcomes()[0].project, "zeta");
        }

        #[test]
        fn manifest_serialization_roundtrip() {
            let mut batch = BatchResult::start();
            batch.record(outcome("a", CloneStatus::Success));
            batch.seal();

            let json = serde_json::to_string(&batch).unwrap();
            assert!(json.contains("\"success_count\":1"));
            let parsed: BatchResult = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed.total_count(), 1);
            assert_eq!(parsed.outcome("a").unwrap().status, CloneStatus::Success);
        }
    }
}
