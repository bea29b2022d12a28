//! credentials::resolver
//!
//! Layered HTTP credential resolution.
//!
//! # Precedence
//!
//! The first source that yields both a user name and a password wins:
//!
//! 1. Explicit CLI pair (`--http-user` / `--http-password`)
//! 2. Credential file entry for the host (when `use_netrc` is set)
//! 3. `GERRIT_HTTP_USER` / `GERRIT_HTTP_PASSWORD`
//! 4. A caller-named fallback environment pair
//!
//! A lone user name, or an empty value, never satisfies a source.
//!
//! # Credential File Discovery
//!
//! An explicit path is used alone. Otherwise `./.netrc` is tried, then
//! `~/.netrc`. A file readable by group or others is used anyway with a
//! warning.
//!
//! # Required Mode
//!
//! With `netrc_required`, a missing, unreadable or malformed credential file
//! is an error. Without it those cases log and resolution continues with the
//! environment.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::env::{CredentialEnv, SystemEnv};
use super::host::normalize_host;
use super::netrc::{Netrc, NetrcParseError};
use crate::core::config::CredentialSettings;

/// Primary environment variable carrying the HTTP user name.
pub const PRIMARY_USER_ENV: &str = "GERRIT_HTTP_USER";

/// Primary environment variable carrying the HTTP password.
pub const PRIMARY_PASSWORD_ENV: &str = "GERRIT_HTTP_PASSWORD";

/// Credential file name looked up in the working and home directories.
pub const NETRC_FILE_NAME: &str = ".netrc";

/// Errors from credential resolution. Only raised in required mode.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential file not found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read credential file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse credential file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: NetrcParseError,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no candidate locations".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where resolved credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSource {
    CliArgument,
    Netrc,
    Environment,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::CliArgument => write!(f, "cli argument"),
            CredentialSource::Netrc => write!(f, "netrc"),
            CredentialSource::Environment => write!(f, "environment"),
        }
    }
}

/// HTTP credentials for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    username: String,
    password: String,
    source: CredentialSource,
    source_detail: String,
}

impl ResolvedCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        source: CredentialSource,
        source_detail: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            source,
            source_detail: source_detail.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Human-readable origin, e.g. the file path or variable names.
    pub fn source_detail(&self) -> &str {
        &self.source_detail
    }
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("username", &self.username)
            .field("password", &"****")
            .field("source", &self.source)
            .field("source_detail", &self.source_detail)
            .finish()
    }
}

impl std::fmt::Display for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (from {}: {})", self.username, self.source, self.source_detail)
    }
}

/// Whether permission bits keep the file private to its owner.
///
/// Group or world read access is reported as insecure.
pub fn permissions_are_secure(mode: u32) -> bool {
    mode & 0o044 == 0
}

/// Resolves HTTP credentials through a [`CredentialEnv`].
///
/// # Example
///
/// ```
/// use mirrorfleet::core::config::CredentialSettings;
/// use mirrorfleet::credentials::{CredentialResolver, CredentialSource, MemoryEnv};
///
/// let env = MemoryEnv::new()
///     .with_home("/home/ci")
///     .with_file(
///         "/home/ci/.netrc",
///         "machine gerrit.example.org login ci password token",
///         0o600,
///     );
/// let settings = CredentialSettings { use_netrc: true, ..Default::default() };
///
/// let creds = CredentialResolver::new(env)
///     .resolve("https://gerrit.example.org", &settings)
///     .unwrap()
///     .unwrap();
/// assert_eq!(creds.username(), "ci");
/// assert_eq!(creds.source(), CredentialSource::Netrc);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver<E = SystemEnv> {
    env: E,
}

impl CredentialResolver<SystemEnv> {
    /// Resolver over the real process environment.
    pub fn system() -> Self {
        Self { env: SystemEnv }
    }
}

impl<E: CredentialEnv> CredentialResolver<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Resolve credentials for `host`.
    ///
    /// Returns `Ok(None)` when no source is satisfied.
    ///
    /// # Errors
    ///
    /// Only with `settings.netrc_required`: a missing, unreadable or
    /// malformed credential file.
    pub fn resolve(
        &self,
        host: &str,
        settings: &CredentialSettings,
    ) -> Result<Option<ResolvedCredentials>, CredentialError> {
        let host = normalize_host(host);

        if let (Some(user), Some(password)) = (
            non_empty(settings.http_user.as_deref()),
            non_empty(settings.http_password.as_deref()),
        ) {
            return Ok(Some(self.found(
                &host,
                ResolvedCredentials::new(
                    user,
                    password,
                    CredentialSource::CliArgument,
                    "--http-user/--http-password",
                ),
            )));
        }

        if settings.use_netrc {
            if let Some(creds) = self.from_netrc(&host, settings)? {
                return Ok(Some(self.found(&host, creds)));
            }
        }

        if let Some(creds) = self.from_env_pair(PRIMARY_USER_ENV, PRIMARY_PASSWORD_ENV) {
            return Ok(Some(self.found(&host, creds)));
        }

        if let Some((user_var, password_var)) = &settings.fallback_env {
            if let Some(creds) = self.from_env_pair(user_var, password_var) {
                return Ok(Some(self.found(&host, creds)));
            }
        }

        debug!(host = %host, "no HTTP credentials resolved");
        Ok(None)
    }

    /// Locate the credential file to read.
    ///
    /// An explicit path is returned only if it exists; it never falls back to
    /// the default locations.
    pub fn find_netrc_file(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        self.candidates(explicit)
            .into_iter()
            .find(|path| self.env.is_file(path))
    }

    fn candidates(&self, explicit: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit {
            return vec![path.to_path_buf()];
        }
        [self.env.current_dir(), self.env.home_dir()]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(NETRC_FILE_NAME))
            .collect()
    }

    fn from_netrc(
        &self,
        host: &str,
        settings: &CredentialSettings,
    ) -> Result<Option<ResolvedCredentials>, CredentialError> {
        let explicit = settings.netrc_file.as_deref();
        let Some(path) = self.find_netrc_file(explicit) else {
            if settings.netrc_required {
                return Err(CredentialError::NotFound {
                    searched: self.candidates(explicit),
                });
            }
            debug!("no credential file found");
            return Ok(None);
        };

        if let Some(mode) = self.env.file_mode(&path) {
            if !permissions_are_secure(mode) {
                warn!(
                    path = %path.display(),
                    mode = %format_args!("{:o}", mode & 0o777),
                    "credential file is readable by group or others; consider chmod 600"
                );
            }
        }

        let text = match self.env.read_to_string(&path) {
            Ok(text) => text,
            Err(source) if settings.netrc_required => {
                return Err(CredentialError::Read { path, source });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read credential file");
                return Ok(None);
            }
        };

        let netrc = match Netrc::parse(&text) {
            Ok(netrc) => netrc,
            Err(source) if settings.netrc_required => {
                return Err(CredentialError::Parse { path, source });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed credential file");
                return Ok(None);
            }
        };

        Ok(netrc.get_credentials(host).map(|entry| {
            ResolvedCredentials::new(
                entry.login(),
                entry.password(),
                CredentialSource::Netrc,
                path.display().to_string(),
            )
        }))
    }

    fn from_env_pair(&self, user_var: &str, password_var: &str) -> Option<ResolvedCredentials> {
        let user = self.env.var(user_var).filter(|v| !v.is_empty())?;
        let password = self.env.var(password_var).filter(|v| !v.is_empty())?;
        Some(ResolvedCredentials::new(
            user,
            password,
            CredentialSource::Environment,
            format!("{}/{}", user_var, password_var),
        ))
    }

    fn found(&self, host: &str, creds: ResolvedCredentials) -> ResolvedCredentials {
        debug!(
            host = %host,
            user = %creds.username(),
            source = %creds.source(),
            detail = %creds.source_detail(),
            "resolved HTTP credentials"
        );
        creds
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
