//! core::config::schema
//!
//! On-disk configuration schema.
//!
//! Every field is optional: a file only needs to name what it changes.
//! The same type carries command-line overrides, so precedence is a plain
//! [`ConfigFile::overlay`] of the CLI layer on top of the file layer.
//!
//! # Example
//!
//! ```toml
//! host = "gerrit.example.org"
//! port = 29418
//! path = "/srv/mirror"
//! threads = 16
//! mirror = true
//! skip_archived = true
//! transport = "ssh"
//!
//! retry_attempts = 3
//! retry_base_delay = 2.0
//! retry_factor = 2.0
//! retry_max_delay = 30.0
//!
//! use_netrc = true
//! netrc_required = false
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Transport};

/// Configuration as read from a TOML file or assembled from CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Review server hostname
    pub host: Option<String>,

    /// SSH port on the review server
    pub port: Option<u16>,

    /// Base URL for HTTPS access (default: `https://<host>`)
    pub base_url: Option<String>,

    /// SSH user name
    pub ssh_user: Option<String>,

    /// Local root directory for clones
    pub path: Option<PathBuf>,

    /// Mirror (bare, all refs) clones
    pub mirror: Option<bool>,

    /// Shallow clone depth (ignored for mirrors)
    pub depth: Option<u32>,

    /// Single branch to clone (ignored for mirrors)
    pub branch: Option<String>,

    /// Number of concurrent clone workers
    pub threads: Option<usize>,

    /// Per-attempt timeout in seconds
    pub clone_timeout: Option<u64>,

    /// Skip READ_ONLY and HIDDEN projects
    pub skip_archived: Option<bool>,

    /// Clone transport: "ssh" or "https"
    pub transport: Option<String>,

    /// Enforce SSH host key checking
    pub strict_host_checking: Option<bool>,

    /// Manifest file written under `path` after a run
    pub manifest_filename: Option<String>,

    pub retry_attempts: Option<u32>,
    pub retry_base_delay: Option<f64>,
    pub retry_factor: Option<f64>,
    pub retry_max_delay: Option<f64>,

    /// Consult the credential file during resolution
    pub use_netrc: Option<bool>,

    /// Explicit credential file location
    pub netrc_file: Option<PathBuf>,

    /// Fail when no credential file is found (HTTPS only)
    pub netrc_required: Option<bool>,

    /// HTTP user name for HTTPS transport
    pub http_user: Option<String>,

    /// HTTP password or token for HTTPS transport
    pub http_password: Option<String>,

    /// Fallback environment variable carrying the HTTP user name
    pub fallback_user_env: Option<String>,

    /// Fallback environment variable carrying the HTTP password
    pub fallback_password_env: Option<String>,
}

macro_rules! overlay_fields {
    ($base:ident, $top:ident, $($field:ident),+ $(,)?) => {
        ConfigFile {
            $($field: $top.$field.or($base.$field),)+
        }
    };
}

impl ConfigFile {
    /// Layer `top` over `self`: any value set in `top` wins.
    pub fn overlay(self, top: ConfigFile) -> ConfigFile {
        let base = self;
        overlay_fields!(
            base,
            top,
            host,
            port,
            base_url,
            ssh_user,
            path,
            mirror,
            depth,
            branch,
            threads,
            clone_timeout,
            skip_archived,
            transport,
            strict_host_checking,
            manifest_filename,
            retry_attempts,
            retry_base_delay,
            retry_factor,
            retry_max_delay,
            use_netrc,
            netrc_file,
            netrc_required,
            http_user,
            http_password,
            fallback_user_env,
            fallback_password_env,
        )
    }

    /// Parse the transport field, if present.
    pub fn transport(&self) -> Result<Option<Transport>, ConfigError> {
        match self.transport.as_deref() {
            None => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }
}
