//! cli::commands::clone
//!
//! Bulk clone of a project list.
//!
//! # Design
//!
//! 1. Load configuration (defaults, config file, flags)
//! 2. Collect projects from arguments and `--projects-file`
//! 3. Resolve HTTP credentials (HTTPS transport only)
//! 4. Run the clone pool; Ctrl-C stops admitting new projects
//! 5. Write the manifest, print the summary
//!
//! Any failed project makes the command exit non-zero after the full
//! summary has been printed.
//!
//! # Example
//!
//! ```bash
//! mfleet clone --host gerrit.example.org --path /srv/mirror ccsdk/apps oom
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use tracing::{debug, info, warn};

use super::{runtime, Context};
use crate::cli::args::CloneArgs;
use crate::clone::manifest::write_manifest;
use crate::clone::{run_credentials, ClonePool};
use crate::core::config::Config;
use crate::core::types::{BatchResult, CloneOutcome, Project, ProjectState};
use crate::credentials::{CredentialResolver, ResolvedCredentials};
use crate::git::ProcessGitRunner;
use crate::ui::output::{self, Verbosity};

/// Run `mfleet clone`.
pub fn clone(ctx: &Context, args: CloneArgs) -> Result<()> {
    let loaded = Config::load(args.config.as_deref(), args.overrides())?;
    if let Some(source) = &loaded.source {
        debug!(path = %source.display(), "loaded config file");
    }
    for warning in &loaded.warnings {
        output::warn(&warning.message, ctx.verbosity);
    }
    let config = loaded.config;

    let projects = collect_projects(&args)?;
    if projects.is_empty() {
        bail!("no projects given; pass project names or --projects-file");
    }

    let credentials = run_credentials(&config, &CredentialResolver::system())?;
    match &credentials {
        Some(creds) => info!(credentials = %creds, "using HTTP credentials"),
        None => debug!(transport = %config.transport, "no HTTP credentials in use"),
    }

    let rt = runtime()?;
    let batch = rt.block_on(run_pool(config, credentials, projects, ctx.verbosity))?;

    print!("{}", output::render_summary(&batch, ctx.verbosity));
    if batch.failed_count() > 0 {
        bail!(
            "{} of {} projects failed",
            batch.failed_count(),
            batch.total_count()
        );
    }
    Ok(())
}

async fn run_pool(
    config: Config,
    credentials: Option<ResolvedCredentials>,
    projects: Vec<Project>,
    verbosity: Verbosity,
) -> Result<BatchResult> {
    let mut pool =
        ClonePool::new(config, Arc::new(ProcessGitRunner::new())).with_credentials(credentials);
    if verbosity != Verbosity::Quiet {
        pool = pool.on_outcome(Arc::new(|outcome: &CloneOutcome| {
            println!("{:<9} {}", outcome.status.to_string(), outcome.project);
        }));
    }

    let cancel = pool.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing projects already in progress");
            cancel.cancel();
        }
    });

    let batch = pool.run(projects).await;
    interrupt.abort();

    let manifest = pool.config().manifest_path();
    write_manifest(&batch, &manifest)
        .await
        .context("run finished but the manifest could not be written")?;
    debug!(path = %manifest.display(), "manifest written");
    Ok(batch)
}

/// Projects from positional names followed by the projects file, first
/// occurrence of each name kept.
fn collect_projects(args: &CloneArgs) -> Result<Vec<Project>> {
    let mut projects: Vec<Project> = args.projects.iter().map(Project::active).collect();
    if let Some(path) = &args.projects_file {
        projects.extend(read_project_file(path)?);
    }

    let mut seen = HashSet::new();
    projects.retain(|p| {
        let fresh = seen.insert(p.name.clone());
        if !fresh {
            warn!(project = %p.name, "duplicate project ignored");
        }
        fresh
    });
    Ok(projects)
}

fn read_project_file(path: &Path) -> Result<Vec<Project>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read project list '{}'", path.display()))?;
    parse_project_list(&text).with_context(|| format!("invalid project list '{}'", path.display()))
}

/// Parse a project list: one name per line, optionally followed by its
/// state. Blank lines and `#` comments are skipped.
///
/// # Errors
///
/// Returns an error naming the line of an unknown state or a line with
/// more than two fields.
pub fn parse_project_list(text: &str) -> Result<Vec<Project>> {
    let mut projects = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = line.split_whitespace().collect::<Vec<_>>();
        let project = match fields.as_slice() {
            [name] => Project::active(*name),
            [name, state] => Project::new(*name, parse_state(state, index + 1)?),
            _ => bail!("line {}: expected '<project> [state]'", index + 1),
        };
        projects.push(project);
    }
    Ok(projects)
}

fn parse_state(value: &str, line: usize) -> Result<ProjectState> {
    match value.to_ascii_uppercase().as_str() {
        "ACTIVE" => Ok(ProjectState::Active),
        "READ_ONLY" => Ok(ProjectState::ReadOnly),
        "HIDDEN" => Ok(ProjectState::Hidden),
        other => bail!("line {}: unknown project state '{}'", line, other),
    }
}
