//! forge
//!
//! Remote repository hosts and bulk operations against them.
//!
//! # Architecture
//!
//! The [`RepoHost`] trait is the seam between the batch layer and a
//! concrete host. Bulk operations in [`batch`] take an `Arc<dyn RepoHost>`
//! and never know which host they are talking to.
//!
//! # Modules
//!
//! - `traits`: [`RepoHost`], [`RemoteRepo`], [`RepoSpec`], [`Owner`],
//!   description sanitizing and remote naming
//! - [`github`]: GitHub implementation using REST and GraphQL
//! - [`mock`]: in-memory implementation for deterministic testing
//! - [`batch`]: bounded-concurrency create/delete fan-out and paginated listing
//!
//! # Example
//!
//! ```ignore
//! use mirrorfleet::forge::{batch_create, github::GitHubHost, Owner, RepoSpec};
//! use std::sync::Arc;
//!
//! let host = Arc::new(GitHubHost::new(token));
//! let specs = vec![RepoSpec::new("ccsdk-apps"), RepoSpec::new("ccsdk-features")];
//! let results = batch_create(host, &Owner::organization("onap"), specs, 8).await;
//! ```

pub mod batch;
pub mod github;
pub mod mock;
mod traits;

pub use batch::{batch_create, batch_delete, list_all, BatchItemResult};
pub use traits::*;
