//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging and per-project output
//! - `--quiet` / `-q`: Failures only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::ConfigFile;

/// mfleet - bulk clone and mirror engine
#[derive(Parser, Debug)]
#[command(name = "mfleet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Failures only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone or refresh every listed project
    #[command(
        name = "clone",
        long_about = "Clone or refresh every listed project.\n\n\
            Projects run concurrently on a fixed pool of workers. Transient failures \
            are retried with exponential backoff; authorization and not-found failures \
            are reported at once. Projects that already exist locally are refreshed \
            instead of cloned. A JSON manifest of the run is written under --path.",
        after_help = "\
EXAMPLES:
    # Mirror three projects over SSH
    mfleet clone --host gerrit.example.org --path /srv/mirror ccsdk/apps ccsdk/features oom

    # Working-tree clones of a list, over HTTPS with credentials from ~/.netrc
    mfleet clone --host gerrit.example.org --https --no-mirror --projects-file projects.txt

PROJECT FILE FORMAT:
    One project per line, optionally followed by its state
    (ACTIVE, READ_ONLY or HIDDEN). Blank lines and lines starting with # are ignored."
    )]
    Clone(CloneArgs),

    /// Manage repositories on GitHub
    #[command(name = "remote")]
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash (add to ~/.bashrc)
    mfleet completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    mfleet completion zsh >> ~/.zshrc

    # Fish
    mfleet completion fish > ~/.config/fish/completions/mfleet.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments of `mfleet clone`.
#[derive(Args, Debug, Default)]
pub struct CloneArgs {
    /// Project names to process
    pub projects: Vec<String>,

    /// Read project names from a file
    #[arg(long, value_name = "FILE")]
    pub projects_file: Option<PathBuf>,

    /// Config file (default: ./mirrorfleet.toml, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Review server hostname
    #[arg(long)]
    pub host: Option<String>,

    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,

    /// Base URL for HTTPS clones (default: https://<host>)
    #[arg(long)]
    pub base_url: Option<String>,

    /// SSH user name
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// Local root directory
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Working-tree clones instead of bare mirrors
    #[arg(long)]
    pub no_mirror: bool,

    /// Shallow clone depth (ignored for mirrors)
    #[arg(long)]
    pub depth: Option<u32>,

    /// Single branch to clone (ignored for mirrors)
    #[arg(long)]
    pub branch: Option<String>,

    /// Concurrent workers
    #[arg(long, short = 'j')]
    pub threads: Option<usize>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Attempts per project
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    /// First backoff delay in seconds
    #[arg(long, value_name = "SECS")]
    pub retry_base_delay: Option<f64>,

    /// Backoff multiplier
    #[arg(long)]
    pub retry_factor: Option<f64>,

    /// Backoff ceiling in seconds
    #[arg(long, value_name = "SECS")]
    pub retry_max_delay: Option<f64>,

    /// Clone over HTTPS instead of SSH
    #[arg(long)]
    pub https: bool,

    /// Disable SSH host key checking
    #[arg(long)]
    pub no_strict_host: bool,

    /// Also clone READ_ONLY and HIDDEN projects
    #[arg(long)]
    pub include_archived: bool,

    /// HTTP user name
    #[arg(long)]
    pub http_user: Option<String>,

    /// HTTP password or token
    #[arg(long)]
    pub http_password: Option<String>,

    /// Credential file to use instead of searching
    #[arg(long, value_name = "FILE")]
    pub netrc_file: Option<PathBuf>,

    /// Never read a credential file
    #[arg(long, conflicts_with_all = ["netrc_file", "netrc_required"])]
    pub no_netrc: bool,

    /// Fail when no credential file is found
    #[arg(long)]
    pub netrc_required: bool,

    /// Manifest file name under --path
    #[arg(long, value_name = "NAME")]
    pub manifest: Option<String>,
}

impl CloneArgs {
    /// Flags as a config layer; unset flags stay `None`.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            host: self.host.clone(),
            port: self.port,
            base_url: self.base_url.clone(),
            ssh_user: self.ssh_user.clone(),
            path: self.path.clone(),
            mirror: self.no_mirror.then_some(false),
            depth: self.depth,
            branch: self.branch.clone(),
            threads: self.threads,
            clone_timeout: self.timeout,
            skip_archived: self.include_archived.then_some(false),
            transport: self.https.then(|| "https".to_string()),
            strict_host_checking: self.no_strict_host.then_some(false),
            manifest_filename: self.manifest.clone(),
            retry_attempts: self.retry_attempts,
            retry_base_delay: self.retry_base_delay,
            retry_factor: self.retry_factor,
            retry_max_delay: self.retry_max_delay,
            use_netrc: self.no_netrc.then_some(false),
            netrc_file: self.netrc_file.clone(),
            netrc_required: self.netrc_required.then_some(true),
            http_user: self.http_user.clone(),
            http_password: self.http_password.clone(),
            fallback_user_env: None,
            fallback_password_env: None,
        }
    }
}

/// Options shared by every `remote` subcommand.
#[derive(Args, Debug)]
pub struct RemoteTarget {
    /// Owning organization or user (default: first organization of the token,
    /// else the token's user)
    #[arg(long)]
    pub owner: Option<String>,

    /// Treat --owner as a user account
    #[arg(long, requires = "owner")]
    pub user: bool,

    /// API token (default: $GITHUB_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// API base URL
    #[arg(long, default_value = crate::forge::github::DEFAULT_API_BASE)]
    pub api_url: String,
}

/// `remote` subcommands.
#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// List every repository of the owner
    List {
        #[command(flatten)]
        target: RemoteTarget,
    },

    /// Create one repository per project; `a/b` becomes `a-b`
    Create {
        #[command(flatten)]
        target: RemoteTarget,

        /// Project names
        #[arg(required = true)]
        projects: Vec<String>,

        /// Description applied to every created repository
        #[arg(long)]
        description: Option<String>,

        /// Create private repositories
        #[arg(long)]
        private: bool,

        /// Requests in flight at once
        #[arg(long, default_value_t = 8)]
        max_concurrent: usize,
    },

    /// Delete repositories by name
    Delete {
        #[command(flatten)]
        target: RemoteTarget,

        /// Repository names
        #[arg(required = true)]
        names: Vec<String>,

        /// Requests in flight at once
        #[arg(long, default_value_t = 8)]
        max_concurrent: usize,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
