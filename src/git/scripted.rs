//! git::scripted
//!
//! Scripted git runner for deterministic testing.
//!
//! # Design
//!
//! Each project gets a queue of scripted results. A `clone` or refresh
//! touching that project pops the next result; once the queue is empty every
//! further invocation succeeds. A project matches an invocation when the
//! clone source URL ends with `/<project>` or the refresh runs in a directory
//! ending with the project path.
//!
//! Clones create their destination directory, on success and on failure, so
//! tests can observe cleanup of partial clones. Every invocation is recorded
//! and the number of invocations running at once is tracked.
//!
//! # Example
//!
//! ```
//! use mirrorfleet::git::scripted::ScriptedGitRunner;
//! use mirrorfleet::git::GitOutput;
//!
//! let runner = ScriptedGitRunner::new()
//!     .script("apps/x", vec![GitOutput::failed("Connection refused")]);
//! assert_eq!(runner.call_count(), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::runner::{GitInvocation, GitOutput, GitRunner};
use super::GitError;

/// Scripted runner. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGitRunner {
    inner: Arc<Mutex<ScriptedInner>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct ScriptedInner {
    scripts: HashMap<String, VecDeque<GitOutput>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Vec<GitInvocation>,
}

impl ScriptedGitRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for invocations touching `project`.
    pub fn script(self, project: &str, results: Vec<GitOutput>) -> Self {
        self.state()
            .scripts
            .entry(project.to_string())
            .or_default()
            .extend(results);
        self
    }

    /// Delay every invocation by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state().default_delay = delay;
        self
    }

    /// Delay invocations touching `project`. A delay beyond the invocation's
    /// timeout yields [`GitError::TimedOut`] at the timeout.
    pub fn delay_project(self, project: &str, delay: Duration) -> Self {
        self.state().delays.insert(project.to_string(), delay);
        self
    }

    /// All invocations so far.
    pub fn calls(&self) -> Vec<GitInvocation> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Invocations touching `project`.
    pub fn calls_for(&self, project: &str) -> Vec<GitInvocation> {
        self.state()
            .calls
            .iter()
            .filter(|inv| touches(inv, project))
            .cloned()
            .collect()
    }

    /// Highest number of invocations observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick the scripted result and delay for an invocation.
    fn next(&self, invocation: &GitInvocation) -> (Option<GitOutput>, Duration) {
        let mut state = self.state();
        state.calls.push(invocation.clone());

        let project = state
            .scripts
            .keys()
            .chain(state.delays.keys())
            .find(|p| touches(invocation, p))
            .cloned();

        match project {
            Some(project) => {
                let delay = state
                    .delays
                    .get(&project)
                    .copied()
                    .unwrap_or(state.default_delay);
                let result = state.scripts.get_mut(&project).and_then(VecDeque::pop_front);
                (result, delay)
            }
            None => (None, state.default_delay),
        }
    }
}

/// Whether an invocation concerns `project`.
fn touches(invocation: &GitInvocation, project: &str) -> bool {
    let suffix = format!("/{}", project);
    if invocation.subcommand() == "clone" {
        let n = invocation.args.len();
        return n >= 2 && invocation.args[n - 2].ends_with(&suffix);
    }
    invocation
        .cwd
        .as_deref()
        .is_some_and(|cwd| cwd.ends_with(Path::new(project)))
}

fn clone_destination(invocation: &GitInvocation) -> Option<PathBuf> {
    if invocation.subcommand() != "clone" {
        return None;
    }
    invocation.args.last().map(PathBuf::from)
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GitRunner for ScriptedGitRunner {
    async fn run(&self, invocation: &GitInvocation) -> Result<GitOutput, GitError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (result, delay) = self.next(invocation);

        if delay > invocation.timeout {
            tokio::time::sleep(invocation.timeout).await;
            return Err(GitError::TimedOut {
                subcommand: invocation.subcommand().to_string(),
                timeout: invocation.timeout,
            });
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(dest) = clone_destination(invocation) {
            tokio::fs::create_dir_all(&dest)
                .await
                .map_err(|e| GitError::Internal {
                    message: e.to_string(),
                })?;
        }

        Ok(result.unwrap_or_else(GitOutput::ok))
    }
}
