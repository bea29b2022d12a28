//! credentials::host
//!
//! Host normalization shared by credential-file lookup and resolution.

/// Reduce a host, URL or `host:port/path` string to a bare lowercase host.
///
/// Strips surrounding whitespace, a leading `scheme://`, any `user@`
/// userinfo, a trailing `/path` and a trailing `:port`. Bracketed IPv6
/// literals keep their brackets.
///
/// # Example
///
/// ```
/// use mirrorfleet::credentials::normalize_host;
///
/// assert_eq!(normalize_host("HTTPS://Gerrit.Example.ORG:8080/r"), "gerrit.example.org");
/// assert_eq!(normalize_host("gerrit.example.org"), "gerrit.example.org");
/// assert_eq!(normalize_host("[::1]:29418"), "[::1]");
/// ```
pub fn normalize_host(input: &str) -> String {
    let mut rest = input.trim();

    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
    }

    if let Some(idx) = rest.find('/') {
        rest = &rest[..idx];
    }

    if let Some(idx) = rest.rfind('@') {
        rest = &rest[idx + 1..];
    }

    let host = if rest.starts_with('[') {
        match rest.find(']') {
            Some(end) => &rest[..=end],
            None => rest,
        }
    } else {
        match rest.find(':') {
            Some(idx) => &rest[..idx],
            None => rest,
        }
    };

    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_hostname_unchanged() {
        assert_eq!(normalize_host("gerrit.example.org"), "gerrit.example.org");
    }

    #[test]
    fn lowercases() {
        assert_eq!(normalize_host("GERRIT.EXAMPLE.ORG"), "gerrit.example.org");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize_host("  gerrit.example.org  "), "gerrit.example.org");
    }

    #[test]
    fn strips_scheme() {
        assert_eq!(normalize_host("https://gerrit.example.org"), "gerrit.example.org");
        assert_eq!(normalize_host("http://gerrit.example.org"), "gerrit.example.org");
        assert_eq!(normalize_host("ssh://gerrit.example.org"), "gerrit.example.org");
    }

    #[test]
    fn strips_port() {
        assert_eq!(normalize_host("gerrit.example.org:8080"), "gerrit.example.org");
    }

    #[test]
    fn strips_path() {
        assert_eq!(normalize_host("gerrit.example.org/r"), "gerrit.example.org");
    }

    #[test]
    fn strips_everything_at_once() {
        assert_eq!(
            normalize_host("HTTPS://Gerrit.Example.ORG:8443/r/a"),
            "gerrit.example.org"
        );
    }

    #[test]
    fn strips_userinfo() {
        assert_eq!(
            normalize_host("ssh://builder@gerrit.example.org:29418"),
            "gerrit.example.org"
        );
    }

    #[test]
    fn keeps_ipv6_brackets() {
        assert_eq!(normalize_host("https://[::1]:8080/x"), "[::1]");
    }
}
