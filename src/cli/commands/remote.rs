//! cli::commands::remote
//!
//! List, create and delete repositories on GitHub.
//!
//! # Design
//!
//! The token comes from `--token`, else `$GITHUB_TOKEN`. The owner comes
//! from `--owner`, else the token's first organization, else the token's
//! user. Create and delete go through the bounded fan-out in
//! [`crate::forge::batch`]; every item is reported and any failed item makes
//! the command exit non-zero.
//!
//! # Example
//!
//! ```bash
//! mfleet remote create --owner onap ccsdk/apps ccsdk/features
//! mfleet remote delete --owner onap ccsdk-apps --max-concurrent 4
//! ```

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::info;

use super::{runtime, Context};
use crate::cli::args::{RemoteCommand, RemoteTarget};
use crate::forge::github::GitHubHost;
use crate::forge::{
    batch_create, batch_delete, list_all, remote_name_for_project, Owner, RepoHost, RepoSpec,
};
use crate::ui::output;

/// Environment variable consulted when `--token` is absent.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Run `mfleet remote <command>`.
pub fn remote(ctx: &Context, command: RemoteCommand) -> Result<()> {
    let rt = runtime()?;
    rt.block_on(run(ctx, command))
}

async fn run(ctx: &Context, command: RemoteCommand) -> Result<()> {
    match command {
        RemoteCommand::List { target } => {
            let host = host_for(&target)?;
            let owner = owner_for(&host, &target).await?;
            let repos = list_all(&host, &owner).await?;
            for repo in repos.values() {
                println!("{}\t{}", repo.name, repo.web_url);
            }
            output::print(format!("{} repositories in {}", repos.len(), owner), ctx.verbosity);
            Ok(())
        }

        RemoteCommand::Create {
            target,
            projects,
            description,
            private,
            max_concurrent,
        } => {
            let host = host_for(&target)?;
            let owner = owner_for(&host, &target).await?;
            let specs = projects
                .iter()
                .map(|project| {
                    let spec = RepoSpec::new(remote_name_for_project(project)).private(private);
                    match &description {
                        Some(d) => spec.with_description(d.as_str()),
                        None => spec,
                    }
                })
                .collect::<Vec<_>>();
            info!(owner = %owner, count = specs.len(), "creating repositories");

            let results = batch_create(Arc::new(host), &owner, specs, max_concurrent).await;
            print!("{}", output::render_batch_items("create", &results));
            fail_if_any(results.iter().filter(|r| !r.is_success()).count())
        }

        RemoteCommand::Delete {
            target,
            names,
            max_concurrent,
        } => {
            let host = host_for(&target)?;
            let owner = owner_for(&host, &target).await?;
            info!(owner = %owner, count = names.len(), "deleting repositories");

            let results = batch_delete(Arc::new(host), &owner.login, names, max_concurrent).await;
            print!("{}", output::render_batch_items("delete", &results));
            fail_if_any(results.iter().filter(|r| !r.is_success()).count())
        }
    }
}

fn host_for(target: &RemoteTarget) -> Result<GitHubHost> {
    let token = target
        .token
        .clone()
        .or_else(|| std::env::var(GITHUB_TOKEN_ENV).ok())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("no GitHub token; pass --token or set {}", GITHUB_TOKEN_ENV))?;
    Ok(GitHubHost::with_api_base(token, target.api_url.as_str()))
}

async fn owner_for(host: &GitHubHost, target: &RemoteTarget) -> Result<Owner> {
    Ok(match &target.owner {
        Some(login) if target.user => Owner::user(login.as_str()),
        Some(login) => Owner::organization(login.as_str()),
        None => {
            let owner = host.default_owner().await?;
            info!(owner = %owner, is_org = owner.is_org(), "using default owner");
            owner
        }
    })
}

fn fail_if_any(failed: usize) -> Result<()> {
    if failed > 0 {
        bail!("{} item(s) failed", failed);
    }
    Ok(())
}
