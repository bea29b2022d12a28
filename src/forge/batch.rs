//! forge::batch
//!
//! Bulk create, delete and list against a [`RepoHost`].
//!
//! # Design
//!
//! Every item becomes its own tokio task. A semaphore sized
//! `max_concurrent` admits tasks into the host call; the rest wait for a
//! permit. A failing status, an error or a panic inside one task is caught
//! at its join handle and recorded as that item's result, so the returned
//! list always has one entry per requested item, in request order.
//!
//! # Example
//!
//! ```ignore
//! use mirrorfleet::forge::{batch_delete, RepoHost};
//! use std::sync::Arc;
//!
//! let results = batch_delete(host, "onap", vec!["a".into(), "b".into()], 8).await;
//! for item in results.iter().filter(|r| !r.is_success()) {
//!     eprintln!("{}: {}", item.name, item.error().unwrap_or_default());
//! }
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::traits::{ForgeError, Owner, RemoteRepo, RepoHost, RepoSpec};

/// Result of one item in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemResult<T> {
    pub name: String,
    pub result: Result<T, String>,
}

impl<T> BatchItemResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Create every spec under `owner`, at most `max_concurrent` at a time.
pub async fn batch_create(
    host: Arc<dyn RepoHost>,
    owner: &Owner,
    specs: Vec<RepoSpec>,
    max_concurrent: usize,
) -> Vec<BatchItemResult<RemoteRepo>> {
    let jobs = specs.into_iter().map(|spec| {
        let host = Arc::clone(&host);
        let owner = owner.clone();
        let name = spec.name.clone();
        (name, async move { host.create_repo(&owner, &spec).await })
    });
    let results = fan_out(jobs, max_concurrent).await;
    log_summary("create", &owner.login, &results);
    results
}

/// Delete every named repository under `owner`, at most `max_concurrent` at
/// a time. Repositories that are already gone count as deleted.
pub async fn batch_delete(
    host: Arc<dyn RepoHost>,
    owner: &str,
    names: Vec<String>,
    max_concurrent: usize,
) -> Vec<BatchItemResult<()>> {
    let jobs = names.into_iter().map(|name| {
        let host = Arc::clone(&host);
        let owner = owner.to_string();
        let repo = name.clone();
        (name, async move { host.delete_repo(&owner, &repo).await })
    });
    let results = fan_out(jobs, max_concurrent).await;
    log_summary("delete", owner, &results);
    results
}

/// Every repository of `owner`, keyed by name, following the cursor until
/// the host reports no further page.
pub async fn list_all(
    host: &dyn RepoHost,
    owner: &Owner,
) -> Result<BTreeMap<String, RemoteRepo>, ForgeError> {
    let mut repos = BTreeMap::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = host.list_page(owner, cursor.as_deref()).await?;
        pages += 1;
        for repo in page.repos {
            repos.insert(repo.name.clone(), repo);
        }

        match page.end_cursor {
            Some(next) if page.has_next_page && cursor.as_deref() != Some(next.as_str()) => {
                cursor = Some(next);
            }
            _ => break,
        }
    }

    debug!(owner = %owner, pages, repos = repos.len(), "listed repositories");
    Ok(repos)
}

/// Run `jobs` behind a semaphore of `max_concurrent` permits.
async fn fan_out<T, F>(
    jobs: impl IntoIterator<Item = (String, F)>,
    max_concurrent: usize,
) -> Vec<BatchItemResult<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ForgeError>> + Send + 'static,
{
    let gate = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let handles = jobs
        .into_iter()
        .map(|(name, job)| {
            let gate = Arc::clone(&gate);
            let handle = tokio::spawn(async move {
                let _permit = gate
                    .acquire_owned()
                    .await
                    .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
                job.await
            });
            (name, handle)
        })
        .collect::<Vec<_>>();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err(format!("task panicked: {}", panic_message(e.into_panic()))),
            Err(e) => Err(format!("task failed: {}", e)),
        };
        if let Err(ref error) = result {
            warn!(item = %name, %error, "batch item failed");
        }
        results.push(BatchItemResult { name, result });
    }
    results
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_summary<T>(operation: &str, owner: &str, results: &[BatchItemResult<T>]) {
    let failed = results.iter().filter(|r| !r.is_success()).count();
    info!(
        operation,
        org = owner,
        total = results.len(),
        failed,
        "batch finished"
    );
}
