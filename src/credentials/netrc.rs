//! credentials::netrc
//!
//! Parser for the machine/login/password credential file format.
//!
//! # Grammar
//!
//! ```text
//! file    := item*
//! item    := entry | macro | <stray token>
//! entry   := ("machine" NAME | "default") pair*
//! pair    := ("login" | "password" | "account") VALUE | <unknown token>
//! macro   := "macdef" NAME <raw lines up to the first blank line>
//! ```
//!
//! An entry's pairs run until the next unquoted `machine`, `default` or
//! `macdef`, or the end of input. `#` at the start of a token comments out
//! the rest of the line. Values may be double-quoted; quoted values support
//! the escapes `\"`, `\\`, `\n`, `\t` and `\r`.
//!
//! Macro bodies are skipped line by line until a wholly blank line, so text
//! inside a macro that looks like a keyword never starts a new entry.
//!
//! # Implementation
//!
//! A small on-demand [`Lexer`] produces tokens with one token of lookahead.
//! Macro skipping works on the raw input, which is why tokens are not
//! produced up front. The reader on top is recursive descent over that
//! token stream and yields a flat entry list.
//!
//! # Example
//!
//! ```
//! use mirrorfleet::credentials::Netrc;
//!
//! let netrc: Netrc = r#"
//!     machine gerrit.example.org login builder password "s3cret pass"
//!     default login anonymous password guest
//! "#.parse().unwrap();
//!
//! let creds = netrc.get_credentials("HTTPS://Gerrit.Example.org:8443/r").unwrap();
//! assert_eq!(creds.login(), "builder");
//! assert_eq!(creds.password(), "s3cret pass");
//!
//! let fallback = netrc.get_credentials("other.example.org").unwrap();
//! assert_eq!(fallback.login(), "anonymous");
//! ```

use std::str::FromStr;

use thiserror::Error;

use super::host::normalize_host;

/// A parse failure, naming the missing or malformed token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line})")]
pub struct NetrcParseError {
    /// What went wrong, e.g. "Expected machine name"
    pub message: String,
    /// 1-based line of the offending token
    pub line: usize,
}

impl NetrcParseError {
    fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Credentials from one complete file entry.
///
/// Value-equal and immutable. `Debug` and `Display` never show the password.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NetrcCredentials {
    machine: String,
    login: String,
    password: String,
}

impl NetrcCredentials {
    /// Create a credential record.
    pub fn new(
        machine: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            machine: machine.into(),
            login: login.into(),
            password: password.into(),
        }
    }

    /// Machine name as written in the file (`default` for the default entry).
    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for NetrcCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetrcCredentials")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .field("password", &"****")
            .finish()
    }
}

impl std::fmt::Display for NetrcCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "machine {} login {} password ****",
            self.machine, self.login
        )
    }
}

/// Parsed credential file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netrc {
    machines: Vec<NetrcCredentials>,
    default: Option<NetrcCredentials>,
}

impl Netrc {
    /// Parse credential file text.
    ///
    /// # Errors
    ///
    /// Returns `NetrcParseError` when `machine` has no name, `login`,
    /// `password` or `account` has no value, `macdef` has no name, or a
    /// quoted value is unterminated.
    pub fn parse(text: &str) -> Result<Self, NetrcParseError> {
        Reader::new(text).read()
    }

    /// Credentials for `host`: the first exact machine match (case-insensitive,
    /// after host normalization), else the `default` entry, else `None`.
    pub fn get_credentials(&self, host: &str) -> Option<&NetrcCredentials> {
        let wanted = normalize_host(host);
        self.machines
            .iter()
            .find(|entry| normalize_host(&entry.machine) == wanted)
            .or(self.default.as_ref())
    }

    /// Names of all complete machine entries, in file order.
    pub fn machines(&self) -> Vec<&str> {
        self.machines.iter().map(|e| e.machine.as_str()).collect()
    }

    /// Whether a complete `default` entry exists.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl FromStr for Netrc {
    type Err = NetrcParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Netrc::parse(s)
    }
}

// --------------------------------------------------------------------------
// Lexer
// --------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    quoted: bool,
    line: usize,
}

impl Token {
    /// Unquoted `machine`, `default` or `macdef`.
    fn starts_item(&self) -> bool {
        !self.quoted && matches!(self.text.as_str(), "machine" | "default" | "macdef")
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    peeked: Option<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            peeked: None,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn next(&mut self) -> Result<Option<Token>, NetrcParseError> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.read_token(),
        }
    }

    fn peek(&mut self) -> Result<Option<&Token>, NetrcParseError> {
        if self.peeked.is_none() {
            self.peeked = self.read_token()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_token(&mut self) -> Result<Option<Token>, NetrcParseError> {
        self.skip_trivia();
        let line = self.line;
        match self.peek_char() {
            None => Ok(None),
            Some('"') => {
                self.bump();
                self.read_quoted(line).map(Some)
            }
            Some(_) => {
                let start = self.pos;
                while let Some(c) = self.peek_char() {
                    if c.is_whitespace() {
                        break;
                    }
                    self.bump();
                }
                Ok(Some(Token {
                    text: self.src[start..self.pos].to_string(),
                    quoted: false,
                    line,
                }))
            }
        }
    }

    fn read_quoted(&mut self, line: usize) -> Result<Token, NetrcParseError> {
        let unterminated = || NetrcParseError::new("Unterminated quoted string", line);
        let mut text = String::new();
        loop {
            match self.bump().ok_or_else(unterminated)? {
                '"' => break,
                '\\' => match self.bump().ok_or_else(unterminated)? {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    other => text.push(other),
                },
                c => text.push(c),
            }
        }
        Ok(Token {
            text,
            quoted: true,
            line,
        })
    }

    /// Skip the remainder of the current line, then whole lines through the
    /// first blank one (or end of input).
    fn skip_macro_body(&mut self) {
        self.peeked = None;
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            let (line, consumed) = match rest.find('\n') {
                Some(idx) => (&rest[..idx], idx + 1),
                None => (rest, rest.len()),
            };
            self.pos += consumed;
            if consumed > line.len() {
                self.line += 1;
            }
            if line.trim().is_empty() {
                break;
            }
        }
    }
}

// --------------------------------------------------------------------------
// Reader
// --------------------------------------------------------------------------

#[derive(Default)]
struct EntryBody {
    login: Option<String>,
    password: Option<String>,
}

impl EntryBody {
    /// Entries missing a login or password are dropped.
    fn into_credentials(self, machine: String) -> Option<NetrcCredentials> {
        match (self.login, self.password) {
            (Some(login), Some(password)) => Some(NetrcCredentials {
                machine,
                login,
                password,
            }),
            _ => None,
        }
    }
}

struct Reader<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lexer: Lexer::new(text),
        }
    }

    fn read(mut self) -> Result<Netrc, NetrcParseError> {
        let mut netrc = Netrc::default();

        while let Some(token) = self.lexer.next()? {
            if token.quoted {
                continue;
            }
            match token.text.as_str() {
                "machine" => {
                    let name = self.value(token.line, "Expected machine name")?;
                    let body = self.entry_body()?;
                    if let Some(creds) = body.into_credentials(name) {
                        netrc.machines.push(creds);
                    }
                }
                "default" => {
                    let body = self.entry_body()?;
                    if netrc.default.is_none() {
                        netrc.default = body.into_credentials("default".to_string());
                    }
                }
                "macdef" => {
                    self.value(token.line, "Expected macro name")?;
                    self.lexer.skip_macro_body();
                }
                _ => {}
            }
        }

        Ok(netrc)
    }

    fn entry_body(&mut self) -> Result<EntryBody, NetrcParseError> {
        let mut body = EntryBody::default();
        loop {
            match self.lexer.peek()? {
                None => break,
                Some(token) if token.starts_item() => break,
                Some(_) => {}
            }
            let Some(token) = self.lexer.next()? else {
                break;
            };
            if token.quoted {
                continue;
            }
            match token.text.as_str() {
                "login" => body.login = Some(self.value(token.line, "Expected login value")?),
                "password" => {
                    body.password = Some(self.value(token.line, "Expected password value")?)
                }
                "account" => {
                    self.value(token.line, "Expected account value")?;
                }
                _ => {}
            }
        }
        Ok(body)
    }

    fn value(&mut self, line: usize, missing: &str) -> Result<String, NetrcParseError> {
        match self.lexer.next()? {
            Some(token) => Ok(token.text),
            None => Err(NetrcParseError::new(missing, line)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Netrc {
        Netrc::parse(text).expect("valid credential file")
    }

    mod basics {
        use super::*;

        #[test]
        fn multi_line_entry() {
            let netrc = parse(
                "
                machine gerrit.example.org
                login myuser
                password mypass
                ",
            );
            let creds = netrc.get_credentials("gerrit.example.org").unwrap();
            assert_eq!(creds.login(), "myuser");
            assert_eq!(creds.password(), "mypass");
        }

        #[test]
        fn multiple_machines() {
            let netrc = parse(
                "machine a.org login u1 password p1
                 machine b.org login u2 password p2
                 machine c.org login u3 password p3",
            );
            assert_eq!(netrc.get_credentials("b.org").unwrap().password(), "p2");
            assert_eq!(netrc.machines(), vec!["a.org", "b.org", "c.org"]);
        }

        #[test]
        fn default_entry_is_fallback() {
            let netrc = parse(
                "machine gerrit.example.org login specific password specpass
                 default login anonymous password guest@example.org",
            );
            assert!(netrc.has_default());
            assert_eq!(
                netrc.get_credentials("gerrit.example.org").unwrap().login(),
                "specific"
            );
            let fallback = netrc.get_credentials("unknown.server.org").unwrap();
            assert_eq!(fallback.login(), "anonymous");
            assert_eq!(fallback.machine(), "default");
        }

        #[test]
        fn no_match_without_default() {
            let netrc = parse("machine other.org login u password p");
            assert!(!netrc.has_default());
            assert!(netrc.get_credentials("gerrit.example.org").is_none());
        }

        #[test]
        fn lookup_is_case_insensitive() {
            let netrc = parse("machine Gerrit.Example.Org login user password pass");
            assert!(netrc.get_credentials("gerrit.example.org").is_some());
            assert!(netrc.get_credentials("GERRIT.EXAMPLE.ORG").is_some());
        }

        #[test]
        fn first_duplicate_wins() {
            let netrc = parse(
                "machine h login first password a
                 machine h login second password b",
            );
            assert_eq!(netrc.get_credentials("h").unwrap().login(), "first");
        }

        #[test]
        fn empty_and_whitespace_input() {
            assert!(parse("").machines().is_empty());
            assert!(parse("   \n\n   \t\t   ")
                .get_credentials("example.org")
                .is_none());
        }
    }

    mod quoting {
        use super::*;

        fn password_of(text: &str) -> String {
            parse(text)
                .get_credentials("example.org")
                .unwrap()
                .password()
                .to_string()
        }

        #[test]
        fn quoted_values_keep_spaces() {
            let netrc = parse(r#"machine example.org login "user name" password "my secret pass""#);
            let creds = netrc.get_credentials("example.org").unwrap();
            assert_eq!(creds.login(), "user name");
            assert_eq!(creds.password(), "my secret pass");
        }

        #[test]
        fn escapes_decode() {
            assert_eq!(
                password_of(r#"machine example.org login u password "pass\"word""#),
                "pass\"word"
            );
            assert_eq!(
                password_of(r#"machine example.org login u password "line1\nline2""#),
                "line1\nline2"
            );
            assert_eq!(
                password_of(r#"machine example.org login u password "col1\tcol2""#),
                "col1\tcol2"
            );
            assert_eq!(
                password_of(r#"machine example.org login u password "text\rmore""#),
                "text\rmore"
            );
            assert_eq!(
                password_of(r#"machine example.org login u password "path\\to\\file""#),
                "path\\to\\file"
            );
        }

        #[test]
        fn quoted_keyword_is_a_value() {
            let netrc = parse(r#"machine example.org login "machine" password p"#);
            assert_eq!(netrc.get_credentials("example.org").unwrap().login(), "machine");
        }

        #[test]
        fn unterminated_quote_fails() {
            let err = Netrc::parse(r#"machine example.org login u password "oops"#).unwrap_err();
            assert!(err.message.contains("Unterminated"));
        }
    }

    mod comments_and_macros {
        use super::*;

        #[test]
        fn comment_lines_and_inline_comments() {
            let netrc = parse(
                "# leading comment
                 machine example.org login user password pass # inline
                 # trailing comment",
            );
            let creds = netrc.get_credentials("example.org").unwrap();
            assert_eq!(creds.login(), "user");
            assert_eq!(creds.password(), "pass");
        }

        #[test]
        fn macdef_is_skipped() {
            let netrc = parse(
                "machine example.org login user password pass
macdef init
cd /home
ls -la

machine other.org login user2 password pass2
",
            );
            assert_eq!(netrc.get_credentials("example.org").unwrap().login(), "user");
            assert_eq!(netrc.get_credentials("other.org").unwrap().login(), "user2");
        }

        #[test]
        fn macdef_body_keywords_do_not_end_macro() {
            let netrc = parse(
                "machine first.org login user1 password pass1
macdef upload
echo \"Uploading to machine server\"
machine evil.org login attacker password stolen
default login trap password trap

machine second.org login user2 password pass2
",
            );
            assert_eq!(netrc.machines(), vec!["first.org", "second.org"]);
            assert!(!netrc.has_default());
            assert!(netrc.get_credentials("evil.org").is_none());
        }

        #[test]
        fn macdef_with_multiple_blank_lines() {
            let netrc = parse(
                "machine example.org login user password pass
macdef test
line1
line2


machine other.org login user2 password pass2
",
            );
            assert_eq!(netrc.get_credentials("other.org").unwrap().login(), "user2");
        }

        #[test]
        fn macdef_at_end_of_input() {
            let netrc = parse("machine a.org login u password p\nmacdef tail\nrun things");
            assert_eq!(netrc.machines(), vec!["a.org"]);
        }
    }

    mod incomplete_entries {
        use super::*;

        #[test]
        fn missing_password_is_dropped() {
            let netrc = parse("machine example.org login user");
            assert!(netrc.get_credentials("example.org").is_none());
            assert!(netrc.machines().is_empty());
        }

        #[test]
        fn missing_login_is_dropped() {
            let netrc = parse("machine example.org password pass");
            assert!(netrc.get_credentials("example.org").is_none());
        }

        #[test]
        fn account_is_recognized_and_discarded() {
            let netrc = parse("machine example.org account acct login user password pass");
            assert_eq!(netrc.get_credentials("example.org").unwrap().login(), "user");
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn machine_without_name() {
            let err = Netrc::parse("machine").unwrap_err();
            assert!(err.to_string().contains("Expected machine name"));
            assert_eq!(err.line, 1);
        }

        #[test]
        fn login_without_value() {
            let err = Netrc::parse("machine example.org login").unwrap_err();
            assert!(err.to_string().contains("Expected login value"));
        }

        #[test]
        fn password_without_value() {
            let err = Netrc::parse("machine example.org login user\npassword").unwrap_err();
            assert!(err.to_string().contains("Expected password value"));
            assert_eq!(err.line, 2);
        }
    }

    mod credentials_record {
        use super::*;

        #[test]
        fn rendering_masks_password() {
            let creds = NetrcCredentials::new("gerrit.example.org", "testuser", "supersecret");
            for rendered in [format!("{:?}", creds), creds.to_string()] {
                assert!(!rendered.contains("supersecret"));
                assert!(rendered.contains("****"));
                assert!(rendered.contains("testuser"));
                assert!(rendered.contains("gerrit.example.org"));
            }
        }

        #[test]
        fn value_equality() {
            let a = NetrcCredentials::new("h", "u", "p");
            let b = NetrcCredentials::new("h", "u", "p");
            assert_eq!(a, b);
            assert_ne!(a, NetrcCredentials::new("h", "u", "other"));
        }
    }
}
