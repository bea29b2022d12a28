//! clone::classify
//!
//! Triage of git transfer error output.
//!
//! # Overview
//!
//! Error text from a failed clone or refresh is sorted into a
//! [`FailureClass`] by case-insensitive substring matching. Two decisions
//! follow from the class:
//!
//! - [`is_retryable`]: only [`FailureClass::Transient`] is retried
//! - [`should_cleanup`]: the partial destination is removed unless the
//!   failure is [`FailureClass::Authorization`], which is left for inspection
//!
//! Authorization and existence patterns are checked before transient ones,
//! so `"Permission denied ... connection reset"` is never retried.
//! Unrecognized text is not retried.
//!
//! [`diagnose`] renders a human-readable explanation with remediation hints.
//!
//! # Example
//!
//! ```
//! use mirrorfleet::clone::classify::{is_retryable, should_cleanup};
//!
//! assert!(is_retryable("ssh: connect to host h port 29418: Connection refused"));
//! assert!(should_cleanup("fatal: early EOF"));
//!
//! assert!(!is_retryable("Permission denied (publickey). connection reset"));
//! assert!(!should_cleanup("Permission denied (publickey)."));
//! ```

/// Credential, permission and host-key failures.
const AUTHORIZATION_PATTERNS: &[&str] = &[
    "permission denied",
    "authentication failed",
    "access denied",
    "invalid credentials",
    "bad credentials",
    "host key verification failed",
];

/// The remote project is missing.
const NOT_FOUND_PATTERNS: &[&str] = &[
    "repository not found",
    "does not exist",
    "fatal: repository",
];

/// Network, protocol and server-side failures that may clear on retry.
const TRANSIENT_PATTERNS: &[&str] = &[
    // connection
    "timed out",
    "timeout",
    "connect to host",
    "connection refused",
    "connection reset",
    "broken pipe",
    "network is unreachable",
    // dns
    "temporary failure in name resolution",
    "could not resolve hostname",
    "could not resolve host",
    "name or service not known",
    // git protocol
    "early eof",
    "the remote end hung up unexpectedly",
    "transfer closed",
    "rpc failed",
    "fetch-pack: unable to spawn",
    "pack-objects died",
    "index-pack failed",
    "protocol error: bad pack header",
    "kex_exchange_identification",
    // server
    "service temporarily unavailable",
    "502 bad gateway",
    "503 service unavailable",
    "504 gateway timeout",
];

/// Category of a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Credentials, permissions or host key; never retried, never cleaned up
    Authorization,
    /// The remote project does not exist; never retried
    NotFound,
    /// Network or server trouble worth another attempt
    Transient,
    /// Nothing recognized
    Unknown,
}

impl FailureClass {
    /// Classify error output.
    pub fn of(error: &str) -> Self {
        let lower = error.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if matches(AUTHORIZATION_PATTERNS) {
            FailureClass::Authorization
        } else if matches(NOT_FOUND_PATTERNS) {
            FailureClass::NotFound
        } else if matches(TRANSIENT_PATTERNS) {
            FailureClass::Transient
        } else {
            FailureClass::Unknown
        }
    }
}

/// Whether another attempt may succeed.
pub fn is_retryable(error: &str) -> bool {
    FailureClass::of(error) == FailureClass::Transient
}

/// Whether a partial destination directory should be removed.
///
/// Empty error text cleans up.
pub fn should_cleanup(error: &str) -> bool {
    FailureClass::of(error) != FailureClass::Authorization
}

/// Render a diagnostic for a failed project.
///
/// `host` adds host-specific remediation commands when known. Text matching
/// no category comes back trimmed.
pub fn diagnose(error: &str, project: &str, host: Option<&str>) -> String {
    let trimmed = error.trim();
    if trimmed.is_empty() {
        return "Clone failed with no error output".to_string();
    }
    let lower = trimmed.to_lowercase();
    let has = |pattern: &str| lower.contains(pattern);

    let mut lines: Vec<String> = Vec::new();

    if has("permission denied") && has("publickey") {
        lines.push(format!("SSH authentication failed for {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - SSH key not added to ssh-agent (run: ssh-add <key-path>)".into());
        lines.push("  - SSH key not authorized on the server".into());
        lines.push("  - Wrong SSH user (try setting ssh_user in config)".into());
        if let Some(host) = host {
            lines.push(String::new());
            lines.push(format!("Test SSH access: ssh -T {}", host));
        }
    } else if has("host key verification failed") {
        lines.push(format!("SSH host key verification failed for {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - Host not in known_hosts file".into());
        lines.push("  - Host key has changed (possible security risk)".into());
        if let Some(host) = host {
            lines.push(String::new());
            lines.push(format!(
                "Add host key: ssh-keyscan {} >> ~/.ssh/known_hosts",
                host
            ));
        }
    } else if has("authentication failed") || has("invalid credentials") || has("bad credentials")
    {
        lines.push(format!("HTTP authentication failed for {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - Wrong user name or password/token".into());
        lines.push("  - No matching entry in the credential file".into());
        lines.push("  - Token expired or revoked".into());
    } else if has("connection refused") {
        lines.push(format!("Connection refused for {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - SSH service is not running on the server".into());
        if let Some(port) = extract_port(&lower) {
            lines.push(format!("  - Wrong port (currently using {})", port));
        }
        if let Some(host) = host {
            lines.push(format!("  - Firewall blocking access to {}", host));
            lines.push(String::new());
            lines.push(format!("Verify SSH port: nmap -p 22,29418 {}", host));
        }
    } else if has("could not resolve hostname")
        || has("could not resolve host")
        || has("name or service not known")
        || has("temporary failure in name resolution")
    {
        lines.push(format!("DNS resolution failed for {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - Hostname is incorrect".into());
        lines.push("  - DNS server is unavailable".into());
        lines.push("  - Network connectivity issue".into());
        if let Some(host) = host {
            lines.push(String::new());
            lines.push(format!("Test DNS: nslookup {}", host));
        }
    } else if NOT_FOUND_PATTERNS.iter().any(|p| has(p)) {
        lines.push(format!("Repository not found: {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - Repository name is incorrect".into());
        lines.push("  - Repository has been deleted or moved".into());
        lines.push("  - You don't have permission to access this repository".into());
    } else if has("timeout") || has("timed out") {
        lines.push(format!("Connection timeout for {}", project));
        lines.push("Possible causes:".into());
        lines.push("  - Network is slow or unstable".into());
        lines.push("  - Server is overloaded".into());
        lines.push("  - Repository is very large".into());
        lines.push(String::new());
        lines.push("Consider increasing clone_timeout in config".into());
    } else if ["network", "connection", "eof", "hung up"]
        .iter()
        .any(|p| has(p))
    {
        return format!("Network error cloning {}: {}", project, trimmed);
    } else {
        return trimmed.to_string();
    }

    lines.join("\n")
}

/// Port number following the word `port` in lowercased error text.
fn extract_port(lower: &str) -> Option<&str> {
    let start = lower.find("port ")? + "port ".len();
    let rest = &lower[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}
