//! credentials::env
//!
//! The narrow capability through which credential resolution reads the
//! process environment and the filesystem.
//!
//! Nothing else in the crate reads environment variables or credential
//! files. Resolution takes a [`CredentialEnv`] so tests can run against
//! [`MemoryEnv`] without touching the real home directory.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment and filesystem access used by the credential resolver.
pub trait CredentialEnv: Send + Sync {
    /// Value of an environment variable, if set.
    fn var(&self, name: &str) -> Option<String>;

    /// Current working directory.
    fn current_dir(&self) -> Option<PathBuf>;

    /// Home directory of the current user.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Whether `path` names a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Unix permission bits of `path`, where the platform has them.
    fn file_mode(&self, path: &Path) -> Option<u32>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl CredentialEnv for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn current_dir(&self) -> Option<PathBuf> {
        std::env::current_dir().ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    #[cfg(unix)]
    fn file_mode(&self, path: &Path) -> Option<u32> {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).ok().map(|m| m.permissions().mode())
    }

    #[cfg(not(unix))]
    fn file_mode(&self, _path: &Path) -> Option<u32> {
        None
    }
}

/// In-memory environment for tests and embedding.
///
/// # Example
///
/// ```
/// use mirrorfleet::credentials::{CredentialEnv, MemoryEnv};
/// use std::path::Path;
///
/// let env = MemoryEnv::new()
///     .with_var("GERRIT_HTTP_USER", "builder")
///     .with_home("/home/builder")
///     .with_file("/home/builder/.netrc", "machine h login u password p", 0o600);
///
/// assert_eq!(env.var("GERRIT_HTTP_USER").as_deref(), Some("builder"));
/// assert!(env.is_file(Path::new("/home/builder/.netrc")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryEnv {
    vars: HashMap<String, String>,
    current_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    files: HashMap<PathBuf, (String, u32)>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    /// Add a file with the given contents and permission bits.
    pub fn with_file(
        mut self,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        mode: u32,
    ) -> Self {
        self.files.insert(path.into(), (contents.into(), mode));
        self
    }
}

impl CredentialEnv for MemoryEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn current_dir(&self) -> Option<PathBuf> {
        self.current_dir.clone()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir.clone()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .map(|(contents, _)| contents.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn file_mode(&self, path: &Path) -> Option<u32> {
        self.files.get(path).map(|(_, mode)| *mode)
    }
}
