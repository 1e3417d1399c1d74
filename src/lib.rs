// src/lib.rs

pub mod changes;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod events;
pub mod fs;
pub mod jobs;
pub mod logging;
pub mod types;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, info};

use crate::changes::{ChangeDetector, FileMarkerStore, GitCli, MarkerStore};
use crate::cli::{CliArgs, Command, PlanArgs};
use crate::config::{load_and_validate, ConfigFile};
use crate::dag::build_order;
use crate::engine::{plan_build, BuildPlan};
use crate::errors::MonobuildError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::jobs::{JobKind, JobStore, QueuedJob, RepositoryBuildRequest, SqliteJobStore};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let repo = config_root_dir(&config_path);
    debug!(repo = ?repo, artifacts = cfg.artifact.len(), "loaded config");

    match args.command {
        Command::Plan(plan) => print_plan(&cfg, &repo, plan).await,
        Command::Status => print_status(&cfg, &repo),
    }
}

/// Change detector over the real repository: `git`, the local filesystem
/// and `.monobuild/markers.json`.
pub fn repository_detector(cfg: &ConfigFile, repo: &Path) -> ChangeDetector {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let markers: Box<dyn MarkerStore> = Box::new(FileMarkerStore::new(Arc::clone(&fs), repo));
    ChangeDetector::new(Arc::new(GitCli), fs, Arc::new(Mutex::new(markers)))
        .with_ignore_file(cfg.config.ignore_file.clone())
}

/// Open the job store configured in `[config].store`.
pub fn open_job_store(cfg: &ConfigFile, repo: &Path) -> errors::Result<SqliteJobStore> {
    SqliteJobStore::open(repo.join(&cfg.config.store))
}

/// Turn `plan` arguments into a repository build request, rejecting
/// artifact names that are not configured.
pub fn build_request(
    cfg: &ConfigFile,
    repo: &Path,
    args: PlanArgs,
) -> errors::Result<RepositoryBuildRequest> {
    let to_set = |names: Option<Vec<String>>| -> errors::Result<Option<BTreeSet<String>>> {
        let Some(names) = names else {
            return Ok(None);
        };
        for name in &names {
            if !cfg.artifact.contains_key(name) {
                return Err(MonobuildError::ArtifactNotFound(name.clone()));
            }
        }
        Ok(Some(names.into_iter().collect()))
    };

    Ok(RepositoryBuildRequest {
        repository_dir: repo.to_path_buf(),
        artifacts: cfg.artifacts(),
        from: to_set(args.from)?,
        upto: to_set(args.upto)?,
        just_build: to_set(args.just_build)?,
        force: args.force,
    })
}

/// The config file's directory, or the working directory for a bare file
/// name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

async fn print_plan(cfg: &ConfigFile, repo: &Path, args: PlanArgs) -> Result<()> {
    let request = build_request(cfg, repo, args)?;
    let detector = repository_detector(cfg, repo);
    let BuildPlan {
        change_set,
        changed,
        subset,
    } = plan_build(&detector, &request).await?;

    println!("monobuild plan");
    println!("  repository: {}", repo.display());
    println!();

    println!("changed ({}):", changed.len());
    for name in &changed {
        let known = request
            .artifacts
            .iter()
            .find(|a| &a.name == name)
            .and_then(|a| change_set.get(&a.path));
        match known {
            Some(files) => println!("  - {name} ({} files)", files.len()),
            None => println!("  - {name} (no previous build)"),
        }
    }
    println!();

    let order = build_order(&subset);
    println!("build order ({}):", order.len());
    for (i, name) in order.iter().enumerate() {
        let deps = subset.dependencies_of(name).cloned().unwrap_or_default();
        if deps.is_empty() {
            println!("  {}. {name}", i + 1);
        } else {
            let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
            println!("  {}. {name} (after {})", i + 1, deps.join(", "));
        }
    }

    info!(to_build = order.len(), "plan complete (no execution)");
    Ok(())
}

/// Entries still queued in the configured job store, oldest first.
///
/// `Ok(None)` when no store has been created yet.
pub fn pending_jobs(cfg: &ConfigFile, repo: &Path) -> errors::Result<Option<Vec<QueuedJob>>> {
    if !repo.join(&cfg.config.store).is_file() {
        return Ok(None);
    }
    Ok(Some(open_job_store(cfg, repo)?.pending()?))
}

fn print_status(cfg: &ConfigFile, repo: &Path) -> Result<()> {
    let Some(pending) = pending_jobs(cfg, repo)? else {
        println!("no job store at {}", repo.join(&cfg.config.store).display());
        return Ok(());
    };

    println!("pending jobs ({}):", pending.len());
    for entry in pending {
        let what = match &entry.job.kind {
            JobKind::RepositoryBuild(req) => format!("repository {}", req.repository_dir.display()),
            JobKind::ArtifactBuild(req) => format!("artifact {}", req.artifact.name),
        };
        let resumed = match &entry.awakened_from {
            Some(from) => format!(" (resuming after {})", from.job.id),
            None => String::new(),
        };
        println!("  #{} {} {what}{resumed}", entry.seq, entry.job.id);
    }
    Ok(())
}
