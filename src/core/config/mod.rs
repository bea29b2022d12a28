//! core::config
//!
//! Run configuration and retry policy.
//!
//! # Overview
//!
//! A [`Config`] is fully populated before a run starts and is passed
//! read-only to the clone pool. It is assembled from three layers (later
//! overrides earlier):
//!
//! 1. Default values
//! 2. Config file
//! 3. CLI flags
//!
//! # Config File Locations
//!
//! Searched in order:
//! 1. Explicit `--config <path>` (must exist)
//! 2. `./mirrorfleet.toml`
//! 3. `$XDG_CONFIG_HOME/mirrorfleet/config.toml` (or the platform equivalent)
//!
//! General configuration never reads environment variables; only the
//! credential resolver does.
//!
//! # Invariants
//!
//! - `mirror = true` forces `depth` and `branch` to `None`
//! - `threads >= 1`, `clone_timeout > 0`
//! - [`RetryPolicy`] has `max_attempts >= 1`, `base_delay > 0`, `factor > 1`
//!
//! # Example
//!
//! ```
//! use mirrorfleet::core::config::Config;
//!
//! let mut config = Config::new("gerrit.example.org");
//! config.depth = Some(5);
//! let warnings = config.normalize();
//!
//! // Mirror mode is the default and discards the depth
//! assert!(config.mirror);
//! assert_eq!(config.depth, None);
//! assert_eq!(warnings.len(), 1);
//! ```

pub mod schema;

pub use schema::ConfigFile;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default SSH port of a Gerrit-style review server.
pub const DEFAULT_SSH_PORT: u16 = 29418;

/// Default per-attempt timeout.
pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default manifest file name.
pub const DEFAULT_MANIFEST_FILENAME: &str = "clone-manifest.json";

/// Upper bound for the default worker count.
const MAX_DEFAULT_THREADS: usize = 32;

/// Local config file name searched in the working directory.
const LOCAL_CONFIG_NAME: &str = "mirrorfleet.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Bounded exponential backoff.
///
/// `delay(i) = min(base_delay * factor^(i-1), max_delay)` for attempt `i >= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    factor: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a validated retry policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `max_attempts` is zero,
    /// `base_delay` is zero, `factor` is not greater than 1, or `max_delay`
    /// is shorter than `base_delay`.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        factor: f64,
        max_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "retry attempts must be at least 1".into(),
            ));
        }
        if base_delay.is_zero() {
            return Err(ConfigError::InvalidValue(
                "retry base delay must be positive".into(),
            ));
        }
        if !factor.is_finite() || factor <= 1.0 {
            return Err(ConfigError::InvalidValue(format!(
                "retry factor must be greater than 1 (got {})",
                factor
            )));
        }
        if max_delay < base_delay {
            return Err(ConfigError::InvalidValue(
                "retry max delay must not be shorter than the base delay".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            factor,
            max_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Backoff before retrying after attempt `attempt` (1-based).
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        if capped.is_finite() {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}

/// How clone URLs are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// `ssh://[user@]host:port/project`
    #[default]
    Ssh,
    /// `<base_url>/project`, with HTTP credentials when resolved
    Https,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" => Ok(Transport::Ssh),
            "https" | "http" => Ok(Transport::Https),
            other => Err(ConfigError::InvalidValue(format!(
                "invalid transport '{}', must be one of: ssh, https",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Ssh => write!(f, "ssh"),
            Transport::Https => write!(f, "https"),
        }
    }
}

/// Credential lookup settings consumed by the credential resolver.
#[derive(Clone, Default, PartialEq)]
pub struct CredentialSettings {
    /// Explicit user name (from CLI or config)
    pub http_user: Option<String>,
    /// Explicit password (from CLI or config)
    pub http_password: Option<String>,
    /// Consult the credential file
    pub use_netrc: bool,
    /// Explicit credential file path
    pub netrc_file: Option<PathBuf>,
    /// Missing credential file is an error instead of a fall-through
    pub netrc_required: bool,
    /// Caller-named fallback environment variable pair
    pub fallback_env: Option<(String, String)>,
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("http_user", &self.http_user)
            .field("has_http_password", &self.http_password.is_some())
            .field("use_netrc", &self.use_netrc)
            .field("netrc_file", &self.netrc_file)
            .field("netrc_required", &self.netrc_required)
            .field("fallback_env", &self.fallback_env)
            .finish()
    }
}

/// Warning produced while normalizing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Path of the config file that was read, if any.
    pub source: Option<PathBuf>,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Fully resolved run configuration.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub ssh_user: Option<String>,
    /// Local root directory; each project lands at `path/<project name>`
    pub path: PathBuf,
    pub mirror: bool,
    pub depth: Option<u32>,
    pub branch: Option<String>,
    /// Maximum number of projects processed at once
    pub threads: usize,
    /// Bound on a single clone or refresh attempt
    pub clone_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub manifest_filename: String,
    pub skip_archived: bool,
    pub transport: Transport,
    pub strict_host_checking: bool,
    pub credentials: CredentialSettings,
}

// Custom Debug to avoid exposing http_password
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("ssh_user", &self.ssh_user)
            .field("path", &self.path)
            .field("mirror", &self.mirror)
            .field("depth", &self.depth)
            .field("branch", &self.branch)
            .field("threads", &self.threads)
            .field("clone_timeout", &self.clone_timeout)
            .field("retry_policy", &self.retry_policy)
            .field("manifest_filename", &self.manifest_filename)
            .field("skip_archived", &self.skip_archived)
            .field("transport", &self.transport)
            .field("strict_host_checking", &self.strict_host_checking)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Config {
    /// Configuration with defaults for the given host.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            base_url: format!("https://{}", host),
            host,
            port: DEFAULT_SSH_PORT,
            ssh_user: None,
            path: PathBuf::from("."),
            mirror: true,
            depth: None,
            branch: None,
            threads: default_threads(),
            clone_timeout: DEFAULT_CLONE_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            manifest_filename: DEFAULT_MANIFEST_FILENAME.to_string(),
            skip_archived: true,
            transport: Transport::Ssh,
            strict_host_checking: true,
            credentials: CredentialSettings {
                use_netrc: true,
                ..Default::default()
            },
        }
    }

    /// Build a configuration from a merged schema layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no host is set, or
    /// `ConfigError::InvalidValue` if any value violates its constraints.
    pub fn from_file(file: ConfigFile) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let transport = file.transport()?;
        let host = file
            .host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::Missing("host"))?;

        let mut config = Config::new(host);
        if let Some(port) = file.port {
            config.port = port;
        }
        if let Some(base_url) = file.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.ssh_user = file.ssh_user.or(config.ssh_user);
        if let Some(path) = file.path {
            config.path = path;
        }
        if let Some(mirror) = file.mirror {
            config.mirror = mirror;
        }
        config.depth = file.depth;
        config.branch = file.branch;
        if let Some(threads) = file.threads {
            config.threads = threads;
        }
        if let Some(secs) = file.clone_timeout {
            config.clone_timeout = Duration::from_secs(secs);
        }
        if let Some(skip) = file.skip_archived {
            config.skip_archived = skip;
        }
        if let Some(transport) = transport {
            config.transport = transport;
        }
        if let Some(strict) = file.strict_host_checking {
            config.strict_host_checking = strict;
        }
        if let Some(name) = file.manifest_filename {
            config.manifest_filename = name;
        }

        let defaults = RetryPolicy::default();
        config.retry_policy = RetryPolicy::new(
            file.retry_attempts.unwrap_or(defaults.max_attempts()),
            seconds(file.retry_base_delay, defaults.base_delay(), "retry_base_delay")?,
            file.retry_factor.unwrap_or(defaults.factor()),
            seconds(file.retry_max_delay, defaults.max_delay(), "retry_max_delay")?,
        )?;

        config.credentials = CredentialSettings {
            http_user: file.http_user,
            http_password: file.http_password,
            use_netrc: file.use_netrc.unwrap_or(true),
            netrc_file: file.netrc_file,
            netrc_required: file.netrc_required.unwrap_or(false),
            fallback_env: match (file.fallback_user_env, file.fallback_password_env) {
                (Some(user), Some(password)) => Some((user, password)),
                _ => None,
            },
        };

        let warnings = config.normalize();
        config.validate()?;
        Ok((config, warnings))
    }

    /// Load configuration from the standard locations with CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit config file is missing, a config file
    /// cannot be parsed, or the merged values are invalid.
    pub fn load(
        explicit: Option<&Path>,
        overrides: ConfigFile,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let (file, source) = match Self::locate(explicit)? {
            Some(path) => (Self::read_file(&path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };

        let (config, warnings) = Self::from_file(file.overlay(overrides))?;
        Ok(ConfigLoadResult {
            config,
            source,
            warnings,
        })
    }

    /// Find the config file to read, if any.
    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let local = PathBuf::from(LOCAL_CONFIG_NAME);
        if local.is_file() {
            return Ok(Some(local));
        }

        if let Some(dir) = dirs::config_dir() {
            let global = dir.join("mirrorfleet").join("config.toml");
            if global.is_file() {
                return Ok(Some(global));
            }
        }

        Ok(None)
    }

    /// Read and parse a config file.
    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Enforce cross-field invariants, returning what was discarded.
    pub fn normalize(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.mirror {
            if let Some(depth) = self.depth.take() {
                warnings.push(ConfigWarning {
                    message: format!("mirror mode ignores depth {}", depth),
                });
            }
            if let Some(branch) = self.branch.take() {
                warnings.push(ConfigWarning {
                    message: format!("mirror mode ignores branch '{}'", branch),
                });
            }
        }
        warnings
    }

    /// Validate value constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("host"));
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidValue(
                "threads must be at least 1".into(),
            ));
        }
        if self.clone_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "clone_timeout must be positive".into(),
            ));
        }
        if self.depth == Some(0) {
            return Err(ConfigError::InvalidValue("depth must be positive".into()));
        }
        if self.manifest_filename.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "manifest_filename must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Destination directory for a project.
    pub fn project_path(&self, project: &str) -> PathBuf {
        project
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.path.clone(), |acc, part| acc.join(part))
    }

    /// Where the run manifest is written.
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(&self.manifest_filename)
    }
}

fn seconds(
    value: Option<f64>,
    default: Duration,
    field: &str,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be non-negative", field))),
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(1, MAX_DEFAULT_THREADS)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod retry_policy {
        use super::*;

        #[test]
        fn delays_grow_and_cap() {
            let policy = RetryPolicy::new(
                5,
                Duration::from_secs(1),
                2.0,
                Duration::from_secs(5),
            )
            .unwrap();

            assert_eq!(policy.delay(1), Duration::from_secs(1));
            assert_eq!(policy.delay(2), Duration::from_secs(2));
            assert_eq!(policy.delay(3), Duration::from_secs(4));
            assert_eq!(policy.delay(4), Duration::from_secs(5));
            assert_eq!(policy.delay(50), Duration::from_secs(5));
        }

        #[test]
        fn attempt_zero_is_first_delay() {
            let policy = RetryPolicy::default();
            assert_eq!(policy.delay(0), policy.base_delay());
        }

        #[test]
        fn rejects_invalid_values() {
            let one = Duration::from_secs(1);
            assert!(RetryPolicy::new(0, one, 2.0, one).is_err());
            assert!(RetryPolicy::new(3, Duration::ZERO, 2.0, one).is_err());
            assert!(RetryPolicy::new(3, one, 1.0, one).is_err());
            assert!(RetryPolicy::new(3, one, f64::NAN, one).is_err());
            assert!(RetryPolicy::new(3, Duration::from_secs(2), 2.0, one).is_err());
        }

        #[test]
        fn huge_attempt_does_not_overflow() {
            let policy =
                RetryPolicy::new(3, Duration::from_secs(1), 10.0, Duration::from_secs(60))
                    .unwrap();
            assert_eq!(policy.delay(u32::MAX), Duration::from_secs(60));
        }
    }

    mod config {
        use super::*;

        #[test]
        fn defaults() {
            let config = Config::new("gerrit.example.org");
            assert_eq!(config.port, 29418);
            assert_eq!(config.base_url, "https://gerrit.example.org");
            assert!(config.mirror);
            assert!(config.skip_archived);
            assert!(config.threads >= 1);
            assert_eq!(config.transport, Transport::Ssh);
            assert!(config.credentials.use_netrc);
            assert!(!config.credentials.netrc_required);
        }

        #[test]
        fn mirror_discards_depth_and_branch() {
            let mut config = Config::new("h");
            config.depth = Some(10);
            config.branch = Some("main".into());
            let warnings = config.normalize();
            assert_eq!(config.depth, None);
            assert_eq!(config.branch, None);
            assert_eq!(warnings.len(), 2);
        }

        #[test]
        fn non_mirror_keeps_depth_and_branch() {
            let mut config = Config::new("h");
            config.mirror = false;
            config.depth = Some(1);
            config.branch = Some("develop".into());
            assert!(config.normalize().is_empty());
            assert_eq!(config.depth, Some(1));
        }

        #[test]
        fn from_file_requires_host() {
            let err = Config::from_file(ConfigFile::default()).unwrap_err();
            assert!(err.to_string().contains("host is required"));
        }

        #[test]
        fn from_file_applies_all_fields() {
            let file = ConfigFile {
                host: Some("gerrit.example.org".into()),
                port: Some(22),
                base_url: Some("https://custom.example.org/".into()),
                ssh_user: Some("testuser".into()),
                path: Some(PathBuf::from("/tmp/repos")),
                mirror: Some(false),
                depth: Some(10),
                branch: Some("main".into()),
                threads: Some(8),
                clone_timeout: Some(300),
                skip_archived: Some(false),
                strict_host_checking: Some(false),
                retry_attempts: Some(5),
                retry_base_delay: Some(1.0),
                retry_factor: Some(1.5),
                retry_max_delay: Some(60.0),
                manifest_filename: Some("manifest.json".into()),
                ..Default::default()
            };

            let (config, warnings) = Config::from_file(file).unwrap();
            assert!(warnings.is_empty());
            assert_eq!(config.port, 22);
            assert_eq!(config.base_url, "https://custom.example.org");
            assert_eq!(config.ssh_user.as_deref(), Some("testuser"));
            assert!(!config.mirror);
            assert_eq!(config.depth, Some(10));
            assert_eq!(config.branch.as_deref(), Some("main"));
            assert_eq!(config.threads, 8);
            assert_eq!(config.clone_timeout, Duration::from_secs(300));
            assert!(!config.skip_archived);
            assert!(!config.strict_host_checking);
            assert_eq!(config.retry_policy.max_attempts(), 5);
            assert_eq!(config.retry_policy.factor(), 1.5);
            assert_eq!(config.retry_policy.max_delay(), Duration::from_secs(60));
            assert_eq!(config.manifest_path(), PathBuf::from("/tmp/repos/manifest.json"));
        }

        #[test]
        fn from_file_rejects_zero_threads() {
            let file = ConfigFile {
                host: Some("h".into()),
                threads: Some(0),
                ..Default::default()
            };
            assert!(Config::from_file(file).is_err());
        }

        #[test]
        fn fallback_env_requires_both_names() {
            let file = ConfigFile {
                host: Some("h".into()),
                fallback_user_env: Some("GERRIT_USERNAME".into()),
                ..Default::default()
            };
            let (config, _) = Config::from_file(file).unwrap();
            assert!(config.credentials.fallback_env.is_none());
        }

        #[test]
        fn load_reads_explicit_file_and_applies_overrides() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("fleet.toml");
            fs::write(&path, "host = \"file.example.org\"\nthreads = 3\n").unwrap();

            let overrides = ConfigFile {
                threads: Some(9),
                ..Default::default()
            };
            let result = Config::load(Some(&path), overrides).unwrap();
            assert_eq!(result.config.host, "file.example.org");
            assert_eq!(result.config.threads, 9);
            assert_eq!(result.source.as_deref(), Some(path.as_path()));
        }

        #[test]
        fn load_missing_explicit_file_fails() {
            let dir = tempfile::tempdir().unwrap();
            let missing = dir.path().join("missing.toml");
            let err = Config::load(Some(&missing), ConfigFile::default()).unwrap_err();
            assert!(matches!(err, ConfigError::NotFound(_)));
        }

        #[test]
        fn project_path_nests_hierarchical_names() {
            let mut config = Config::new("h");
            config.path = PathBuf::from("/srv/mirror");
            assert_eq!(
                config.project_path("ccsdk/apps"),
                PathBuf::from("/srv/mirror/ccsdk/apps")
            );
        }

        #[test]
        fn debug_redacts_password() {
            let mut config = Config::new("h");
            config.credentials.http_password = Some("hunter2".into());
            let debug = format!("{:?}", config);
            assert!(!debug.contains("hunter2"));
            assert!(debug.contains("has_http_password"));
        }
    }
}
