//! forge::mock
//!
//! In-memory repository host for deterministic testing.
//!
//! # Design
//!
//! Repositories live in a map keyed by `owner/name`. Individual names can be
//! set to fail with a given error or to panic, every call can be delayed,
//! and the highest number of concurrent calls is recorded so batch tests can
//! check their concurrency ceiling.
//!
//! # Example
//!
//! ```
//! use mirrorfleet::forge::mock::MockRepoHost;
//! use mirrorfleet::forge::{Owner, RepoHost, RepoSpec};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let host = MockRepoHost::new();
//! let org = Owner::organization("onap");
//! host.create_repo(&org, &RepoSpec::new("ccsdk-apps")).await.unwrap();
//! assert!(host.repo_exists("onap", "ccsdk-apps").await.unwrap());
//! # });
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{ForgeError, Owner, RemoteRepo, RepoHost, RepoPage, RepoSpec};

/// Mock repository host.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockRepoHost {
    inner: Arc<Mutex<MockInner>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct MockInner {
    /// Repositories by `owner/name`.
    repos: BTreeMap<String, RemoteRepo>,
    failures: HashMap<String, ForgeError>,
    panics: HashSet<String>,
    delay: Duration,
    page_size: usize,
    orgs: Vec<String>,
    user: String,
    list_calls: usize,
}

impl MockRepoHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                repos: BTreeMap::new(),
                failures: HashMap::new(),
                panics: HashSet::new(),
                delay: Duration::ZERO,
                page_size: 100,
                orgs: Vec::new(),
                user: "mock-user".to_string(),
                list_calls: 0,
            })),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every operation on repository `name` with `error`.
    pub fn fail_on(self, name: &str, error: ForgeError) -> Self {
        self.state().failures.insert(name.to_string(), error);
        self
    }

    /// Panic inside every operation on repository `name`.
    pub fn panic_on(self, name: &str) -> Self {
        self.state().panics.insert(name.to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state().delay = delay;
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state().page_size = page_size.max(1);
        self
    }

    /// Organizations the token belongs to, in order.
    pub fn with_orgs(self, orgs: &[&str]) -> Self {
        self.state().orgs = orgs.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn with_user(self, login: &str) -> Self {
        self.state().user = login.to_string();
        self
    }

    pub fn repo_count(&self) -> usize {
        self.state().repos.len()
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    /// Highest number of operations observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Common entry for per-repository operations: track concurrency, wait
    /// out the delay, then apply configured failures.
    async fn enter(&self, name: &str) -> Result<InFlight<'_>, ForgeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let (delay, panics, failure) = {
            let state = self.state();
            (
                state.delay,
                state.panics.contains(name),
                state.failures.get(name).cloned(),
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if panics {
            panic!("mock host panic on {}", name);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(guard),
        }
    }
}

impl Default for MockRepoHost {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn key(owner: &str, name: &str) -> String {
    format!("{}/{}", owner, name)
}

fn mock_repo(owner: &str, spec: &RepoSpec) -> RemoteRepo {
    let full_name = key(owner, &spec.name);
    RemoteRepo {
        name: spec.name.clone(),
        web_url: format!("https://mock.invalid/{}", full_name),
        clone_url: format!("https://mock.invalid/{}.git", full_name),
        ssh_url: format!("git@mock.invalid:{}.git", full_name),
        full_name,
        private: spec.private,
        description: super::traits::sanitize_description(spec.description.as_deref()),
    }
}

#[async_trait]
impl RepoHost for MockRepoHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_repo(&self, owner: &Owner, spec: &RepoSpec) -> Result<RemoteRepo, ForgeError> {
        let _guard = self.enter(&spec.name).await?;
        let mut state = self.state();
        let k = key(&owner.login, &spec.name);
        if state.repos.contains_key(&k) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: "Repository already exists".into(),
            });
        }
        let repo = mock_repo(&owner.login, spec);
        state.repos.insert(k, repo.clone());
        Ok(repo)
    }

    async fn delete_repo(&self, owner: &str, name: &str) -> Result<(), ForgeError> {
        let _guard = self.enter(name).await?;
        self.state().repos.remove(&key(owner, name));
        Ok(())
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, ForgeError> {
        let _guard = self.enter(name).await?;
        Ok(self.state().repos.get(&key(owner, name)).cloned())
    }

    async fn list_page(&self, owner: &Owner, cursor: Option<&str>) -> Result<RepoPage, ForgeError> {
        let mut state = self.state();
        state.list_calls += 1;

        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let prefix = format!("{}/", owner.login);
        let owned = state
            .repos
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, repo)| repo.clone())
            .collect::<Vec<_>>();

        let end = (start + state.page_size).min(owned.len());
        let repos = owned.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let has_next_page = end < owned.len();
        Ok(RepoPage {
            repos,
            has_next_page,
            end_cursor: has_next_page.then(|| end.to_string()),
        })
    }

    async fn default_owner(&self) -> Result<Owner, ForgeError> {
        let state = self.state();
        Ok(match state.orgs.first() {
            Some(org) => Owner::organization(org.clone()),
            None => Owner::user(state.user.clone()),
        })
    }
}
