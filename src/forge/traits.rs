//! forge::traits
//!
//! Repository host trait and the shared request/response types.
//!
//! # Design
//!
//! [`RepoHost`] is async because every operation is a network round trip.
//! Per-item failures surface as [`ForgeError`]; the batch layer in
//! [`super::batch`] turns them into data so one item never aborts its
//! siblings.
//!
//! # Example
//!
//! ```ignore
//! use mirrorfleet::forge::{Owner, RepoHost, RepoSpec};
//!
//! async fn ensure(host: &dyn RepoHost, org: &Owner) -> Result<(), ForgeError> {
//!     if !host.repo_exists(&org.login, "ccsdk-apps").await? {
//!         host.create_repo(org, &RepoSpec::new("ccsdk-apps")).await?;
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest description a repository host accepts.
pub const MAX_DESCRIPTION_CHARS: usize = 350;

const ELLIPSIS: &str = "...";

/// Errors from repository host operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// No token was supplied.
    #[error("authentication required")]
    AuthRequired,

    /// The token was rejected or lacks permission.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// An owner or repository name that cannot be used in a request path.
    #[error("invalid repository or owner name: {0:?}")]
    InvalidName(String),

    /// The API answered with a failing status.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response text
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Kind of account owning repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Organization,
    User,
}

/// An account that owns repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    pub kind: OwnerKind,
}

impl Owner {
    pub fn organization(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: OwnerKind::Organization,
        }
    }

    pub fn user(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: OwnerKind::User,
        }
    }

    pub fn is_org(&self) -> bool {
        self.kind == OwnerKind::Organization
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.login)
    }
}

/// A repository as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub name: String,
    pub full_name: String,
    pub web_url: String,
    pub clone_url: String,
    pub ssh_url: String,
    pub private: bool,
    pub description: Option<String>,
}

/// Parameters for creating a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    pub name: String,
    pub description: Option<String>,
    pub private: bool,
}

impl RepoSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            private: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoPage {
    pub repos: Vec<RemoteRepo>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Remote repository host.
///
/// Implementations must be safe to share across the tasks of a batch.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Host name for diagnostics.
    fn name(&self) -> &'static str;

    /// Create `spec` under `owner`.
    async fn create_repo(&self, owner: &Owner, spec: &RepoSpec) -> Result<RemoteRepo, ForgeError>;

    /// Delete `owner/name`. A repository that is already absent is not an
    /// error.
    async fn delete_repo(&self, owner: &str, name: &str) -> Result<(), ForgeError>;

    /// Fetch `owner/name`, `None` when it does not exist.
    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, ForgeError>;

    async fn repo_exists(&self, owner: &str, name: &str) -> Result<bool, ForgeError> {
        Ok(self.get_repo(owner, name).await?.is_some())
    }

    /// One page of `owner`'s repositories starting after `cursor`.
    ///
    /// An owner the host does not know, or a query the host rejects, yields
    /// an empty final page.
    async fn list_page(&self, owner: &Owner, cursor: Option<&str>) -> Result<RepoPage, ForgeError>;

    /// The account repositories land in by default: the first organization
    /// the token belongs to, else the token's own user.
    async fn default_owner(&self) -> Result<Owner, ForgeError>;
}

/// Normalize a description for a repository host.
///
/// Control characters become spaces, whitespace runs collapse to a single
/// space and the edges are trimmed. Anything longer than
/// [`MAX_DESCRIPTION_CHARS`] is cut to exactly that length ending in `...`.
/// Blank input yields `None`.
pub fn sanitize_description(description: Option<&str>) -> Option<String> {
    let raw = description?;
    let cleaned = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    if collapsed.chars().count() <= MAX_DESCRIPTION_CHARS {
        return Some(collapsed);
    }
    let keep = MAX_DESCRIPTION_CHARS - ELLIPSIS.len();
    let mut truncated = collapsed.chars().take(keep).collect::<String>();
    truncated.push_str(ELLIPSIS);
    Some(truncated)
}

/// Flatten a hierarchical project name into a single repository name.
///
/// `ccsdk/apps` becomes `ccsdk-apps`.
pub fn remote_name_for_project(project: &str) -> String {
    project.replace('/', "-")
}
