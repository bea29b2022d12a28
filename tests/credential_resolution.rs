//! Integration tests for credential resolution.
//!
//! The layered chain is exercised against an in-memory environment, and the
//! credential file path against real files on disk.

use std::path::PathBuf;

use mirrorfleet::clone::run_credentials;
use mirrorfleet::core::config::{Config, CredentialSettings, Transport};
use mirrorfleet::credentials::{
    CredentialError, CredentialResolver, CredentialSource, MemoryEnv, PRIMARY_PASSWORD_ENV,
    PRIMARY_USER_ENV,
};

const HOST: &str = "gerrit.example.org";

fn settings() -> CredentialSettings {
    CredentialSettings {
        use_netrc: true,
        fallback_env: Some(("CI_GERRIT_USER".into(), "CI_GERRIT_TOKEN".into())),
        ..Default::default()
    }
}

fn env(netrc: bool, primary: bool, fallback: bool) -> MemoryEnv {
    let mut env = MemoryEnv::new().with_current_dir("/work").with_home("/home/ci");
    if netrc {
        env = env.with_file(
            "/home/ci/.netrc",
            "machine gerrit.example.org login file_user password file_pass",
            0o600,
        );
    }
    if primary {
        env = env
            .with_var(PRIMARY_USER_ENV, "env_user")
            .with_var(PRIMARY_PASSWORD_ENV, "env_pass");
    }
    if fallback {
        env = env
            .with_var("CI_GERRIT_USER", "fb_user")
            .with_var("CI_GERRIT_TOKEN", "fb_pass");
    }
    env
}

mod precedence_chain {
    use super::*;

    #[test]
    fn each_source_takes_over_when_the_previous_is_removed() {
        let mut with_cli = settings();
        with_cli.http_user = Some("cli_user".into());
        with_cli.http_password = Some("cli_pass".into());

        let cases = [
            (env(true, true, true), &with_cli, "cli_user", CredentialSource::CliArgument),
            (env(true, true, true), &settings(), "file_user", CredentialSource::Netrc),
            (env(false, true, true), &settings(), "env_user", CredentialSource::Environment),
            (env(false, false, true), &settings(), "fb_user", CredentialSource::Environment),
        ];

        for (env, settings, user, source) in cases {
            let creds = CredentialResolver::new(env)
                .resolve(HOST, settings)
                .unwrap()
                .unwrap();
            assert_eq!(creds.username(), user);
            assert_eq!(creds.source(), source);
        }
    }

    #[test]
    fn nothing_available_is_none() {
        let resolved = CredentialResolver::new(env(false, false, false))
            .resolve(HOST, &settings())
            .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn fallback_detail_names_variables() {
        let creds = CredentialResolver::new(env(false, false, true))
            .resolve(HOST, &settings())
            .unwrap()
            .unwrap();
        assert_eq!(creds.source_detail(), "CI_GERRIT_USER/CI_GERRIT_TOKEN");
    }

    #[test]
    fn host_with_scheme_and_port_matches_file_entry() {
        let creds = CredentialResolver::new(env(true, false, false))
            .resolve("https://GERRIT.example.org:8443/r/", &settings())
            .unwrap()
            .unwrap();
        assert_eq!(creds.password(), "file_pass");
    }
}

mod on_disk {
    use super::*;

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netrc");
        std::fs::write(
            &path,
            "# build farm\nmachine gerrit.example.org\n  login \"ci bot\"\n  password \"p\\\"w\"\n",
        )
        .unwrap();

        let mut s = settings();
        s.netrc_file = Some(path.clone());
        s.fallback_env = None;

        let creds = CredentialResolver::system().resolve(HOST, &s).unwrap().unwrap();
        assert_eq!(creds.username(), "ci bot");
        assert_eq!(creds.password(), "p\"w");
        assert_eq!(creds.source(), CredentialSource::Netrc);
        assert_eq!(creds.source_detail(), path.display().to_string());
    }

    #[test]
    fn missing_explicit_file_required_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.netrc_file = Some(dir.path().join("absent"));
        s.netrc_required = true;

        let err = CredentialResolver::system().resolve(HOST, &s).unwrap_err();
        match err {
            CredentialError::NotFound { searched } => {
                assert_eq!(searched, vec![dir.path().join("absent")]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn malformed_file_required_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netrc");
        std::fs::write(&path, "machine gerrit.example.org login").unwrap();

        let mut s = settings();
        s.netrc_file = Some(path);
        s.netrc_required = true;

        let err = CredentialResolver::system().resolve(HOST, &s).unwrap_err();
        assert!(matches!(err, CredentialError::Parse { .. }));
        assert!(err.to_string().contains("Expected login value"));
    }
}

mod transport_scope {
    use super::*;

    fn required_config(transport: Transport) -> Config {
        let mut config = Config::new(HOST);
        config.transport = transport;
        config.credentials.netrc_required = true;
        config.credentials.netrc_file = Some(PathBuf::from("/nonexistent/netrc"));
        config
    }

    #[test]
    fn ssh_ignores_required_mode() {
        let resolver = CredentialResolver::new(MemoryEnv::new());
        let creds = run_credentials(&required_config(Transport::Ssh), &resolver).unwrap();
        assert!(creds.is_none());
    }

    #[test]
    fn https_enforces_required_mode() {
        let resolver = CredentialResolver::new(MemoryEnv::new());
        let result = run_credentials(&required_config(Transport::Https), &resolver);
        assert!(matches!(result, Err(CredentialError::NotFound { .. })));
    }
}
