//! forge::github
//!
//! GitHub repository host using the REST and GraphQL APIs.
//!
//! # Design
//!
//! - REST for create, delete, get and owner detection
//! - GraphQL for listing, one request per page of 100, following
//!   `pageInfo.hasNextPage` / `pageInfo.endCursor`
//!
//! Listing is forgiving: a response carrying GraphQL errors, or naming an
//! owner that does not exist, ends the listing with no repositories. Callers
//! that care whether the owner exists check beforehand.
//!
//! # Rate Limiting
//!
//! A 429 maps to [`ForgeError::RateLimited`]; there is no automatic retry.
//!
//! # Errors
//!
//! Failing responses keep GitHub's own words: the top-level `message` and
//! every entry of `errors[]` end up in the returned [`ForgeError`].
//!
//! Owner and repository names are checked before they are placed in a REST
//! path. A name that could step outside its path segment fails with
//! [`ForgeError::InvalidName`] and no request is sent.
//!
//! # Example
//!
//! ```ignore
//! use mirrorfleet::forge::github::GitHubHost;
//! use mirrorfleet::forge::{Owner, RepoHost, RepoSpec};
//!
//! let host = GitHubHost::new(token);
//! let repo = host
//!     .create_repo(&Owner::organization("onap"), &RepoSpec::new("ccsdk-apps"))
//!     .await?;
//! println!("created {}", repo.web_url);
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{
    sanitize_description, ForgeError, Owner, OwnerKind, RemoteRepo, RepoHost, RepoPage, RepoSpec,
};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "mirrorfleet";

/// Repositories requested per GraphQL page.
const PAGE_SIZE: u32 = 100;

/// GitHub repository host.
pub struct GitHubHost {
    client: Client,
    token: String,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
    graphql_url: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("api_base", &self.api_base)
            .field("graphql_url", &self.graphql_url)
            .finish_non_exhaustive()
    }
}

impl GitHubHost {
    /// Host talking to github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Host talking to `api_base`; GraphQL lives at `<api_base>/graphql`.
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let graphql_url = format!("{}/graphql", api_base);
        Self {
            client: Client::new(),
            token: token.into(),
            api_base,
            graphql_url,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        if self.token.is_empty() {
            return Err(ForgeError::AuthRequired);
        }
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str) -> Result<Response, ForgeError> {
        self.client
            .get(self.url(path))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(self.error_from_response(response, status).await)
        }
    }

    /// Map a failing response to an error carrying the response text.
    async fn error_from_response(&self, response: Response, status: StatusCode) -> ForgeError {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);

        match status {
            StatusCode::UNAUTHORIZED => {
                ForgeError::AuthFailed(format!("Invalid or expired token: {}", message))
            }
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("Permission denied: {}", message)),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited(message),
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn graphql(&self, body: &GraphQLRequest<'_>) -> Result<GraphQLResponse, ForgeError> {
        let response = self
            .client
            .post(&self.graphql_url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        self.handle_response(response).await
    }
}

/// Readable text of a failing response body.
///
/// A GitHub error document yields its `message` followed by each
/// `errors[]` entry, joined with `; `. Any other non-empty body is used
/// as-is.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<GitHubErrorResponse>(body) {
        Ok(err) => std::iter::once(err.message)
            .chain(err.errors.into_iter().filter_map(GitHubErrorDetail::into_text))
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => "Unknown error".to_string(),
    }
}

/// Check that `value` stays a single REST path segment.
fn path_segment(value: &str) -> Result<&str, ForgeError> {
    let unsafe_char = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    if value.is_empty() || value == "." || value == ".." || value.contains(unsafe_char) {
        return Err(ForgeError::InvalidName(value.to_string()));
    }
    Ok(value)
}

/// Escape a value for interpolation inside a GraphQL string literal.
pub fn escape_graphql_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Listing query for `owner`. The cursor travels as a variable.
fn list_query(owner: &Owner) -> String {
    let field = match owner.kind {
        OwnerKind::Organization => "organization",
        OwnerKind::User => "user",
    };
    format!(
        r#"query($cursor: String) {{
  {field}(login: "{login}") {{
    repositories(first: {page_size}, after: $cursor, orderBy: {{field: NAME, direction: ASC}}) {{
      nodes {{ name nameWithOwner url sshUrl isPrivate description }}
      pageInfo {{ hasNextPage endCursor }}
    }}
  }}
}}"#,
        field = field,
        login = escape_graphql_string(&owner.login),
        page_size = PAGE_SIZE,
    )
}

#[async_trait]
impl RepoHost for GitHubHost {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn create_repo(&self, owner: &Owner, spec: &RepoSpec) -> Result<RemoteRepo, ForgeError> {
        let path = match owner.kind {
            OwnerKind::Organization => format!("orgs/{}/repos", path_segment(&owner.login)?),
            OwnerKind::User => "user/repos".to_string(),
        };
        path_segment(&spec.name)?;
        let description = sanitize_description(spec.description.as_deref());
        let body = CreateRepoBody {
            name: &spec.name,
            description: description.as_deref(),
            private: spec.private,
            auto_init: false,
        };

        let response = self
            .client
            .post(self.url(&path))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        let repo: GitHubRepo = self.handle_response(response).await?;
        debug!(owner = %owner, repo = %repo.name, "created repository");
        Ok(repo.into())
    }

    async fn delete_repo(&self, owner: &str, name: &str) -> Result<(), ForgeError> {
        let path = format!("repos/{}/{}", path_segment(owner)?, path_segment(name)?);
        let response = self
            .client
            .delete(self.url(&path))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            debug!(owner, repo = name, "repository already absent");
            Ok(())
        } else {
            Err(self.error_from_response(response, status).await)
        }
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RemoteRepo>, ForgeError> {
        let path = format!("repos/{}/{}", path_segment(owner)?, path_segment(name)?);
        let response = self.get(&path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let repo: GitHubRepo = self.handle_response(response).await?;
        Ok(Some(repo.into()))
    }

    async fn list_page(&self, owner: &Owner, cursor: Option<&str>) -> Result<RepoPage, ForgeError> {
        let query = list_query(owner);
        let request = GraphQLRequest {
            query: &query,
            variables: GraphQLVariables { cursor },
        };
        let response = self.graphql(&request).await?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let messages = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(owner = %owner, errors = %messages, "listing query returned errors");
            return Ok(RepoPage::default());
        }

        let connection = response
            .data
            .and_then(|data| data.organization.or(data.user))
            .map(|o| o.repositories);
        let Some(connection) = connection else {
            warn!(owner = %owner, "listing found no such owner");
            return Ok(RepoPage::default());
        };

        Ok(RepoPage {
            repos: connection
                .nodes
                .into_iter()
                .flatten()
                .map(RemoteRepo::from)
                .collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }

    async fn default_owner(&self) -> Result<Owner, ForgeError> {
        let orgs: Vec<GitHubAccount> = self.handle_response(self.get("user/orgs").await?).await?;
        if let Some(org) = orgs.into_iter().next() {
            return Ok(Owner::organization(org.login));
        }
        let user: GitHubAccount = self.handle_response(self.get("user").await?).await?;
        Ok(Owner::user(user.login))
    }
}

// =============================================================================
// GitHub API types (internal)
// =============================================================================

#[derive(Serialize)]
struct CreateRepoBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    private: bool,
    auto_init: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<GitHubErrorDetail>,
}

/// One entry of a REST error's `errors` array: either plain text or a
/// validation object.
#[derive(Deserialize)]
#[serde(untagged)]
enum GitHubErrorDetail {
    Text(String),
    Field {
        message: Option<String>,
        field: Option<String>,
        code: Option<String>,
    },
}

impl GitHubErrorDetail {
    fn into_text(self) -> Option<String> {
        match self {
            GitHubErrorDetail::Text(text) => Some(text),
            GitHubErrorDetail::Field {
                message: Some(message),
                ..
            } => Some(message),
            GitHubErrorDetail::Field { field, code, .. } => {
                let parts = [field, code].into_iter().flatten().collect::<Vec<_>>();
                (!parts.is_empty()).then(|| parts.join(" "))
            }
        }
    }
}

#[derive(Deserialize)]
struct GitHubAccount {
    login: String,
}

/// REST repository payload.
#[derive(Deserialize)]
struct GitHubRepo {
    name: String,
    full_name: String,
    html_url: String,
    clone_url: String,
    ssh_url: String,
    #[serde(default)]
    private: bool,
    description: Option<String>,
}

impl From<GitHubRepo> for RemoteRepo {
    fn from(gh: GitHubRepo) -> Self {
        RemoteRepo {
            name: gh.name,
            full_name: gh.full_name,
            web_url: gh.html_url,
            clone_url: gh.clone_url,
            ssh_url: gh.ssh_url,
            private: gh.private,
            description: sanitize_description(gh.description.as_deref()),
        }
    }
}

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: GraphQLVariables<'a>,
}

#[derive(Serialize)]
struct GraphQLVariables<'a> {
    cursor: Option<&'a str>,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<ListData>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    organization: Option<RepoOwnerNode>,
    #[serde(default)]
    user: Option<RepoOwnerNode>,
}

#[derive(Deserialize)]
struct RepoOwnerNode {
    repositories: RepoConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoConnection {
    #[serde(default)]
    nodes: Vec<Option<RepoNode>>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// GraphQL repository node.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoNode {
    name: String,
    name_with_owner: String,
    url: String,
    ssh_url: String,
    is_private: bool,
    description: Option<String>,
}

impl From<RepoNode> for RemoteRepo {
    fn from(node: RepoNode) -> Self {
        RemoteRepo {
            clone_url: format!("{}.git", node.url),
            name: node.name,
            full_name: node.name_with_owner,
            web_url: node.url,
            ssh_url: node.ssh_url,
            private: node.is_private,
            description: sanitize_description(node.description.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod construction {
        use super::*;

        #[test]
        fn default_api_base() {
            let host = GitHubHost::new("t");
            assert_eq!(host.api_base(), DEFAULT_API_BASE);
            assert_eq!(host.graphql_url, "https://api.github.com/graphql");
        }

        #[test]
        fn custom_api_base_trims_slash() {
            let host = GitHubHost::with_api_base("t", "http://127.0.0.1:9999/");
            assert_eq!(host.api_base(), "http://127.0.0.1:9999");
            assert_eq!(host.url("/repos/a/b"), "http://127.0.0.1:9999/repos/a/b");
        }

        #[test]
        fn debug_redacts_token() {
            let host = GitHubHost::new("ghp_supersecret");
            let debug = format!("{:?}", host);
            assert!(!debug.contains("ghp_supersecret"));
            assert!(debug.contains("api_base"));
        }

        #[test]
        fn empty_token_requires_auth() {
            let host = GitHubHost::new("");
            assert!(matches!(host.headers(), Err(ForgeError::AuthRequired)));
        }

        #[test]
        fn token_with_newline_is_rejected() {
            let host = GitHubHost::new("bad\ntoken");
            assert!(matches!(host.headers(), Err(ForgeError::AuthFailed(_))));
        }
    }

    mod query {
        use super::*;

        #[test]
        fn escapes_quotes_and_backslashes() {
            assert_eq!(escape_graphql_string(r#"test"org"#), r#"test\"org"#);
            assert_eq!(escape_graphql_string(r"a\b"), r"a\\b");
        }

        #[test]
        fn organization_query() {
            let q = list_query(&Owner::organization(r#"test"org"#));
            assert!(q.contains(r#"organization(login: "test\"org")"#));
            assert!(q.contains("hasNextPage endCursor"));
            assert!(q.contains("after: $cursor"));
        }

        #[test]
        fn user_query() {
            let q = list_query(&Owner::user("octocat"));
            assert!(q.contains(r#"user(login: "octocat")"#));
        }
    }

    mod payloads {
        use super::*;

        #[test]
        fn rest_repo_maps_html_url() {
            let json = r#"{
                "name": "test-repo",
                "full_name": "org/test-repo",
                "html_url": "https://github.com/org/test-repo",
                "clone_url": "https://github.com/org/test-repo.git",
                "ssh_url": "git@github.com:org/test-repo.git",
                "private": true
            }"#;
            let repo: RemoteRepo = serde_json::from_str::<GitHubRepo>(json).unwrap().into();
            assert_eq!(repo.web_url, "https://github.com/org/test-repo");
            assert!(repo.private);
            assert_eq!(repo.description, None);
        }

        #[test]
        fn graphql_node_derives_clone_url() {
            let json = r#"{
                "name": "repo1",
                "nameWithOwner": "test-org/repo1",
                "url": "https://github.com/test-org/repo1",
                "sshUrl": "git@github.com:test-org/repo1.git",
                "isPrivate": false,
                "description": "Test repo 1"
            }"#;
            let repo: RemoteRepo = serde_json::from_str::<RepoNode>(json).unwrap().into();
            assert_eq!(repo.full_name, "test-org/repo1");
            assert_eq!(repo.clone_url, "https://github.com/test-org/repo1.git");
        }

        #[test]
        fn null_organization_parses() {
            let json = r#"{"data": {"organization": null}}"#;
            let resp: GraphQLResponse = serde_json::from_str(json).unwrap();
            let data = resp.data.unwrap();
            assert!(data.organization.is_none());
            assert!(data.user.is_none());
        }

        #[test]
        fn descriptions_are_cleaned_on_read() {
            let json = r#"{
                "name": "messy",
                "full_name": "org/messy",
                "html_url": "https://github.com/org/messy",
                "clone_url": "https://github.com/org/messy.git",
                "ssh_url": "git@github.com:org/messy.git",
                "description": "  first\n\nsecond\t\tthird  "
            }"#;
            let repo: RemoteRepo = serde_json::from_str::<GitHubRepo>(json).unwrap().into();
            assert_eq!(repo.description.as_deref(), Some("first second third"));

            let json = r#"{
                "name": "blank",
                "nameWithOwner": "org/blank",
                "url": "https://github.com/org/blank",
                "sshUrl": "git@github.com:org/blank.git",
                "isPrivate": false,
                "description": " \n "
            }"#;
            let repo: RemoteRepo = serde_json::from_str::<RepoNode>(json).unwrap().into();
            assert_eq!(repo.description, None);
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn validation_details_are_kept() {
            let body = r#"{
                "message": "Repository creation failed.",
                "errors": [{
                    "resource": "Repository",
                    "code": "custom",
                    "field": "name",
                    "message": "name already exists on this account"
                }],
                "documentation_url": "https://docs.github.com/rest/repos/repos#create-an-organization-repository"
            }"#;
            assert_eq!(
                error_message(body),
                "Repository creation failed.; name already exists on this account"
            );
        }

        #[test]
        fn detail_without_message_uses_field_and_code() {
            let body = r#"{
                "message": "Validation Failed",
                "errors": [
                    {"resource": "Repository", "field": "name", "code": "missing_field"},
                    "name is too long"
                ]
            }"#;
            assert_eq!(
                error_message(body),
                "Validation Failed; name missing_field; name is too long"
            );
        }

        #[test]
        fn plain_and_empty_bodies() {
            assert_eq!(error_message("  upstream connect error \n"), "upstream connect error");
            assert_eq!(error_message(""), "Unknown error");
            assert_eq!(error_message(r#"{"message": "Not Found"}"#), "Not Found");
        }

        #[test]
        fn path_segments_stay_single() {
            assert_eq!(path_segment("ccsdk-apps").unwrap(), "ccsdk-apps");
            assert_eq!(path_segment("repo.name_1").unwrap(), "repo.name_1");
            for bad in ["", ".", "..", "a/b", "x/../../user", "a?b", "a#b", "a%2fb", "a b", "a\\b"] {
                assert!(
                    matches!(path_segment(bad), Err(ForgeError::InvalidName(_))),
                    "{:?} accepted",
                    bad
                );
            }
        }
    }
}
