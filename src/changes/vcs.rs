// src/changes/vcs.rs

//! Version-control queries needed by change detection.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::types::BoxFuture;

/// Read-only view of the repository history.
///
/// All paths are relative to the repository root and use forward slashes.
pub trait VcsBackend: Send + Sync + Debug {
    /// Identifier of the commit currently checked out.
    fn head_commit<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<String>>;

    /// Files touched by any commit in `from..to`, even if a later commit
    /// reverted them.
    fn changed_files_between<'a>(
        &'a self,
        repo: &'a Path,
        from: &'a str,
        to: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Files that are modified, added, deleted or untracked in the working
    /// tree relative to the current commit.
    fn workspace_changes<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<Vec<String>>>;
}

/// [`VcsBackend`] that runs the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("running git {}", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl VcsBackend for GitCli {
    fn head_commit<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.run(repo, &["rev-parse", "HEAD"]).await?.trim().to_string()) })
    }

    fn changed_files_between<'a>(
        &'a self,
        repo: &'a Path,
        from: &'a str,
        to: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let range = format!("{from}..{to}");
            let out = self
                .run(
                    repo,
                    &["log", "--name-only", "--format=", "--no-renames", "-z", &range],
                )
                .await?;
            Ok(parse_log_names(&out))
        })
    }

    fn workspace_changes<'a>(&'a self, repo: &'a Path) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let out = self
                .run(
                    repo,
                    &["status", "--porcelain", "-z", "--untracked-files=all", "--no-renames"],
                )
                .await?;
            Ok(parse_status_entries(&out))
        })
    }
}

/// Paths from `git log --name-only --format= -z`, each reported once.
fn parse_log_names(out: &str) -> Vec<String> {
    out.split('\0')
        .map(|name| name.trim_matches('\n'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Paths from `git status --porcelain -z`. Entries are `XY path`, unquoted.
fn parse_status_entries(out: &str) -> Vec<String> {
    out.split('\0').filter_map(parse_status_entry).collect()
}

fn parse_status_entry(entry: &str) -> Option<String> {
    let path = entry.get(3..)?;
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_names_are_deduplicated_across_commits() {
        // two commits touching the same file, the second one reverting it
        let out = "\npackages/a/index.js\0packages/b/b.js\0\0\npackages/a/index.js\0";
        assert_eq!(
            parse_log_names(out),
            vec!["packages/a/index.js".to_string(), "packages/b/b.js".to_string()]
        );
        assert!(parse_log_names("").is_empty());
    }

    #[test]
    fn status_entries_keep_special_characters_verbatim() {
        let out = " M packages/a/index.js\0?? packages/a/my notes.txt\0D  packages/b/\"quoted\".js\0A  packages/c/ünï.rs\0";
        assert_eq!(
            parse_status_entries(out),
            vec![
                "packages/a/index.js".to_string(),
                "packages/a/my notes.txt".to_string(),
                "packages/b/\"quoted\".js".to_string(),
                "packages/c/ünï.rs".to_string(),
            ]
        );
    }

    #[test]
    fn short_status_entries_are_skipped() {
        assert_eq!(parse_status_entry(""), None);
        assert_eq!(parse_status_entry("?? "), None);
        assert_eq!(parse_status_entry(" M"), None);
    }
}
