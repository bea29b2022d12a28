//! git::runner
//!
//! Subprocess seam for git invocations.
//!
//! # Overview
//!
//! Clones and refreshes run the `git` executable. The [`GitRunner`] trait
//! is the only way the clone pool starts one, so tests substitute a
//! scripted runner and never touch the network.
//!
//! [`ProcessGitRunner`] bounds each invocation by its timeout. A process
//! still running at the deadline is killed and reported as
//! [`GitError::TimedOut`], whose message reads "timed out" and so flows
//! through the same retry path as any transient failure.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::GitError;

/// One git command to run.
#[derive(Clone, PartialEq, Eq)]
pub struct GitInvocation {
    /// Arguments after the program name
    pub args: Vec<String>,
    /// Working directory, if not the process default
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Upper bound on wall-clock time
    pub timeout: Duration,
}

impl GitInvocation {
    pub fn new(args: Vec<String>, timeout: Duration) -> Self {
        Self {
            args,
            cwd: None,
            env: Vec::new(),
            timeout,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// The git subcommand, e.g. `clone`.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

// Arguments may embed credentials in a URL; only the subcommand is shown.
impl std::fmt::Debug for GitInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitInvocation")
            .field("subcommand", &self.subcommand())
            .field("cwd", &self.cwd)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Result of a completed git process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Successful output with no text.
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Default::default()
        }
    }

    /// Failed output carrying `stderr`.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(128),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Combined error text: stderr, then stdout, trimmed.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        match (stderr.is_empty(), stdout.is_empty()) {
            (false, false) => format!("{}\n{}", stderr, stdout),
            (false, true) => stderr.to_string(),
            (true, false) => stdout.to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Runs git commands.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run one invocation to completion or timeout.
    ///
    /// A non-zero exit is `Ok` with `success == false`; `Err` means the
    /// process could not be started or did not finish in time.
    async fn run(&self, invocation: &GitInvocation) -> Result<GitOutput, GitError>;
}

/// Runs the system `git` executable.
#[derive(Debug, Clone)]
pub struct ProcessGitRunner {
    program: PathBuf,
}

impl Default for ProcessGitRunner {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl ProcessGitRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl GitRunner for ProcessGitRunner {
    async fn run(&self, invocation: &GitInvocation) -> Result<GitOutput, GitError> {
        let mut command = Command::new(&self.program);
        command
            .args(&invocation.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &invocation.env {
            command.env(key, value);
        }
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        debug!(subcommand = invocation.subcommand(), cwd = ?invocation.cwd, "running git");

        let child = command.spawn().map_err(|e| GitError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await
        {
            Ok(result) => result.map_err(|e| GitError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?,
            Err(_) => {
                return Err(GitError::TimedOut {
                    subcommand: invocation.subcommand().to_string(),
                    timeout: invocation.timeout,
                })
            }
        };

        Ok(GitOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
