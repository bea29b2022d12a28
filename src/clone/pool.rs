//! clone::pool
//!
//! Concurrent clone worker pool.
//!
//! # Overview
//!
//! [`ClonePool::run`] takes the project list for a run and returns a sealed
//! [`BatchResult`] with exactly one [`CloneOutcome`] per project.
//!
//! # Architecture
//!
//! - A shared queue of pending projects; each pop is exclusive
//! - `threads` worker tasks pull from the queue until it is empty
//! - Outcomes travel over an mpsc channel to a single collector, which
//!   appends them to the `BatchResult` in landing order
//!
//! A project's attempts are serialized inside one worker; projects are
//! independent, so a slow project only ever occupies its own worker.
//!
//! # Per-Project Flow
//!
//! ```text
//! archived + skip_archived ─────────────────────────▶ SKIPPED
//! destination is a repository ── refresh (retried) ─▶ REFRESHED | FAILED
//! destination non-empty, not a repository ──────────▶ FAILED
//! otherwise ── clone (retried) ─────────────────────▶ SUCCESS | FAILED
//! ```
//!
//! A terminal clone failure removes the partial destination unless the
//! classifier says to keep it for inspection. An existing repository is
//! never removed.
//!
//! # Cancellation
//!
//! [`CancelToken::cancel`] stops workers from taking new projects. An
//! attempt already running finishes or hits its timeout; a project waiting
//! out a backoff stops at once and fails with its last error. Projects
//! never started are reported SKIPPED with error `cancelled`.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::classify::{diagnose, is_retryable, should_cleanup};
use super::command::{clone_args, clone_url, git_env, refresh_args};
use super::retry::retry_until;
use crate::core::config::{Config, Transport};
use crate::core::types::{BatchResult, CloneOutcome, CloneStatus, Project};
use crate::credentials::{CredentialEnv, CredentialError, CredentialResolver, ResolvedCredentials};
use crate::git::{GitInvocation, GitRunner, LocalRepo};

/// Error text recorded for projects never started because of cancellation.
pub const CANCELLED: &str = "cancelled";

/// Run-level cancellation flag. Clones share the flag.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl Default for CancelToken {
    fn default() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called, immediately
    /// if it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Callback invoked by the collector as each outcome lands.
pub type OutcomeObserver = Arc<dyn Fn(&CloneOutcome) + Send + Sync>;

/// Resolve the run's HTTP credentials.
///
/// SSH runs never need them and get `Ok(None)` without any lookup, even in
/// required mode.
///
/// # Errors
///
/// Propagates [`CredentialError`] from required-mode resolution.
pub fn run_credentials<E: CredentialEnv>(
    config: &Config,
    resolver: &CredentialResolver<E>,
) -> Result<Option<ResolvedCredentials>, CredentialError> {
    match config.transport {
        Transport::Ssh => Ok(None),
        Transport::Https => resolver.resolve(&config.host, &config.credentials),
    }
}

/// State shared by every worker.
struct Shared {
    config: Config,
    runner: Arc<dyn GitRunner>,
    credentials: Option<ResolvedCredentials>,
    cancel: CancelToken,
}

/// Clone worker pool.
///
/// # Example
///
/// ```
/// use mirrorfleet::clone::pool::ClonePool;
/// use mirrorfleet::core::config::Config;
/// use mirrorfleet::core::types::Project;
/// use mirrorfleet::git::scripted::ScriptedGitRunner;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let root = tempfile::tempdir().unwrap();
/// let mut config = Config::new("gerrit.example.org");
/// config.path = root.path().to_path_buf();
///
/// let pool = ClonePool::new(config, Arc::new(ScriptedGitRunner::new()));
/// let batch = pool.run(vec![Project::active("tools/build")]).await;
/// assert_eq!(batch.success_count(), 1);
/// # }
/// ```
pub struct ClonePool {
    config: Config,
    runner: Arc<dyn GitRunner>,
    credentials: Option<ResolvedCredentials>,
    cancel: CancelToken,
    observer: Option<OutcomeObserver>,
}

impl std::fmt::Debug for ClonePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClonePool")
            .field("host", &self.config.host)
            .field("threads", &self.config.threads)
            .field("has_credentials", &self.credentials.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ClonePool {
    pub fn new(config: Config, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            config,
            runner,
            credentials: None,
            cancel: CancelToken::new(),
            observer: None,
        }
    }

    /// Use resolved HTTP credentials for HTTPS clone URLs.
    pub fn with_credentials(mut self, credentials: Option<ResolvedCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Use an externally controlled cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Observe outcomes as they land.
    pub fn on_outcome(mut self, observer: OutcomeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Token that cancels this pool's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process every project and return the sealed result.
    pub async fn run(&self, projects: Vec<Project>) -> BatchResult {
        let mut batch = BatchResult::start();
        let shared = Arc::new(Shared {
            config: self.config.clone(),
            runner: Arc::clone(&self.runner),
            credentials: self.credentials.clone(),
            cancel: self.cancel.clone(),
        });
        let all: Vec<(String, PathBuf)> = projects
            .iter()
            .map(|p| (p.name.clone(), self.config.project_path(&p.name)))
            .collect();

        info!(
            run_id = %batch.run_id,
            projects = projects.len(),
            threads = self.config.threads,
            "starting clone run"
        );

        let worker_count = self.config.threads.max(1).min(projects.len().max(1));
        let queue = Arc::new(Mutex::new(VecDeque::from(projects)));
        let (tx, mut rx) = mpsc::unbounded_channel::<CloneOutcome>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let shared = Arc::clone(&shared);
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            workers.push(tokio::spawn(async move {
                while !shared.cancel.is_cancelled() {
                    let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                    let Some(project) = next else { break };
                    debug!(worker, project = %project.name, "picked project");
                    let outcome = process_project(&shared, &project).await;
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut seen = HashSet::new();
        while let Some(outcome) = rx.recv().await {
            self.land(&mut batch, &mut seen, outcome);
        }

        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "clone worker terminated abnormally");
            }
        }

        // Projects without an outcome were never started or lost with a
        // failed worker.
        for (name, path) in all {
            if seen.contains(&name) {
                continue;
            }
            let outcome = if self.cancel.is_cancelled() {
                CloneOutcome::skipped(name, path, CANCELLED)
            } else {
                CloneOutcome {
                    project: name,
                    status: CloneStatus::Failed,
                    attempts: 0,
                    error: Some("clone worker terminated abnormally".into()),
                    elapsed: std::time::Duration::ZERO,
                    path,
                    head: None,
                }
            };
            self.land(&mut batch, &mut seen, outcome);
        }

        batch.seal();
        info!(
            run_id = %batch.run_id,
            total = batch.total_count(),
            success = batch.success_count(),
            refreshed = batch.refreshed_count(),
            failed = batch.failed_count(),
            skipped = batch.skipped_count(),
            "clone run finished"
        );
        batch
    }

    fn land(&self, batch: &mut BatchResult, seen: &mut HashSet<String>, outcome: CloneOutcome) {
        if !seen.insert(outcome.project.clone()) {
            warn!(project = %outcome.project, "duplicate outcome ignored");
            return;
        }
        if let Some(observer) = &self.observer {
            observer(&outcome);
        }
        batch.record(outcome);
    }
}

/// Drive one project to a terminal outcome.
async fn process_project(shared: &Shared, project: &Project) -> CloneOutcome {
    let config = &shared.config;
    let path = config.project_path(&project.name);
    let started = Instant::now();

    if config.skip_archived && project.state.is_archived() {
        debug!(project = %project.name, state = %project.state, "skipping archived project");
        return CloneOutcome::skipped(
            project.name.clone(),
            path,
            format!("project is {}", project.state),
        );
    }

    let existing = LocalRepo::open(&path).ok().map(|repo| repo.is_bare());
    let result = if path.exists() {
        match existing {
            Some(bare) => refresh(shared, project, &path, bare).await,
            None if dir_is_empty(&path) => clone(shared, project, &path).await,
            None => Step::failed(
                0,
                format!(
                    "destination {} exists and is not a git repository",
                    path.display()
                ),
            ),
        }
    } else {
        clone(shared, project, &path).await
    };

    let head = match result.status {
        CloneStatus::Success | CloneStatus::Refreshed => {
            LocalRepo::open(&path).ok().and_then(|repo| repo.head_oid())
        }
        _ => None,
    };
    let outcome = CloneOutcome {
        project: project.name.clone(),
        status: result.status,
        attempts: result.attempts,
        error: result.error,
        elapsed: started.elapsed(),
        path,
        head,
    };

    match outcome.status {
        CloneStatus::Failed => warn!(
            project = %outcome.project,
            attempts = outcome.attempts,
            "project failed"
        ),
        status => info!(
            project = %outcome.project,
            attempts = outcome.attempts,
            status = %status,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "project done"
        ),
    }
    outcome
}

/// Terminal status of a clone or refresh step.
struct Step {
    status: CloneStatus,
    attempts: u32,
    error: Option<String>,
}

impl Step {
    fn failed(attempts: u32, error: String) -> Self {
        Self {
            status: CloneStatus::Failed,
            attempts,
            error: Some(error),
        }
    }
}

async fn clone(shared: &Shared, project: &Project, path: &Path) -> Step {
    let config = &shared.config;
    let url = match clone_url(config, &project.name, shared.credentials.as_ref()) {
        Ok(url) => url,
        Err(e) => return Step::failed(0, e.to_string()),
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return Step::failed(
                0,
                format!("cannot create {}: {}", parent.display(), e),
            );
        }
    }

    debug!(project = %project.name, url = %url, "cloning");
    let invocation = GitInvocation::new(clone_args(config, url.as_str(), path), config.clone_timeout)
        .with_env(git_env(config));

    let result = retry_until(
        &config.retry_policy,
        |attempt| {
            let invocation = &invocation;
            async move {
                if attempt > 1 {
                    remove_partial(path).await;
                }
                attempt_once(shared, invocation).await
            }
        },
        |error: &String| is_retryable(error),
        shared.cancel.cancelled(),
    )
    .await;

    match result {
        Ok(done) => Step {
            status: CloneStatus::Success,
            attempts: done.attempts,
            error: None,
        },
        Err(failure) => {
            if should_cleanup(&failure.error) {
                remove_partial(path).await;
            } else {
                debug!(project = %project.name, "keeping destination for inspection");
            }
            Step::failed(
                failure.attempts,
                diagnose(&failure.error, &project.name, Some(&config.host)),
            )
        }
    }
}

async fn refresh(shared: &Shared, project: &Project, path: &Path, bare: bool) -> Step {
    let config = &shared.config;
    debug!(project = %project.name, bare, "refreshing existing clone");
    let invocation = GitInvocation::new(refresh_args(bare), config.clone_timeout)
        .in_dir(path)
        .with_env(git_env(config));

    let result = retry_until(
        &config.retry_policy,
        |_| attempt_once(shared, &invocation),
        |error: &String| is_retryable(error),
        shared.cancel.cancelled(),
    )
    .await;

    match result {
        Ok(done) => Step {
            status: CloneStatus::Refreshed,
            attempts: done.attempts,
            error: None,
        },
        Err(failure) => Step::failed(
            failure.attempts,
            diagnose(&failure.error, &project.name, Some(&config.host)),
        ),
    }
}

/// One git invocation, with any failure flattened to its error text.
async fn attempt_once(shared: &Shared, invocation: &GitInvocation) -> Result<(), String> {
    match shared.runner.run(invocation).await {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(output.error_text()),
        Err(e) => Err(e.to_string()),
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial clone"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove partial clone"),
    }
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
