//! credentials
//!
//! HTTP credential handling for HTTPS transport.
//!
//! # Modules
//!
//! - [`host`] - Host normalization shared by lookup and resolution
//! - [`netrc`] - Credential file parser
//! - [`env`] - Injectable environment/filesystem capability
//! - [`resolver`] - Layered resolution (CLI, file, environment)
//!
//! # Security
//!
//! Passwords are never logged. Every credential type masks its password in
//! `Debug` and `Display`.

pub mod env;
pub mod host;
pub mod netrc;
pub mod resolver;

pub use env::{CredentialEnv, MemoryEnv, SystemEnv};
pub use host::normalize_host;
pub use netrc::{Netrc, NetrcCredentials, NetrcParseError};
pub use resolver::{
    permissions_are_secure, CredentialError, CredentialResolver, CredentialSource,
    ResolvedCredentials, PRIMARY_PASSWORD_ENV, PRIMARY_USER_ENV,
};
