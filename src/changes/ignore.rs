// src/changes/ignore.rs

//! Hierarchical ignore files.
//!
//! Any directory between the repository root and a file may contain an
//! ignore file (`.monobuildignore` by default). Each non-empty line that
//! does not start with `#` is a glob relative to that directory; a leading
//! `!` re-includes paths. All files on the way down apply, root first, and
//! the last matching rule decides, so the closest directory wins.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::fs::FileSystem;

pub const DEFAULT_IGNORE_FILE: &str = ".monobuildignore";

struct IgnoreRule {
    pattern: String,
    matcher: GlobSet,
    negated: bool,
}

impl fmt::Debug for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreRule")
            .field("pattern", &self.pattern)
            .field("negated", &self.negated)
            .finish_non_exhaustive()
    }
}

impl IgnoreRule {
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };

        // A leading slash anchors the pattern to the ignore file's directory;
        // otherwise a bare name matches at any depth.
        let anchored = pattern.starts_with('/') || pattern.trim_end_matches('/').contains('/');
        let body = pattern.trim_start_matches('/').trim_end_matches('/');
        if body.is_empty() {
            return Ok(None);
        }

        let base = if anchored {
            body.to_string()
        } else {
            format!("**/{body}")
        };

        // Matching a directory ignores everything below it.
        let matcher = build_globset(&[base.clone(), format!("{base}/**")])
            .with_context(|| format!("invalid ignore pattern: {line}"))?;

        Ok(Some(Self {
            pattern: line.to_string(),
            matcher,
            negated,
        }))
    }
}

/// Lazily loaded ignore rules for one repository.
#[derive(Debug)]
pub struct IgnoreRules {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    file_name: String,
    /// Rules per repository-relative directory ("" is the root).
    cache: HashMap<String, Vec<IgnoreRule>>,
}

impl IgnoreRules {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            fs,
            root: root.into(),
            file_name: file_name.into(),
            cache: HashMap::new(),
        }
    }

    /// Whether `rel_path` (relative to the repository root, forward slashes)
    /// must never count as a change.
    pub fn is_ignored(&mut self, rel_path: &str) -> bool {
        let mut ignored = false;

        for dir in ancestor_dirs(rel_path) {
            let rel_to_dir = if dir.is_empty() {
                rel_path
            } else {
                &rel_path[dir.len() + 1..]
            };

            for rule in self.rules_for(&dir) {
                if rule.matcher.is_match(rel_to_dir) {
                    ignored = !rule.negated;
                }
            }
        }

        if ignored {
            debug!(path = %rel_path, "path ignored by ignore rules");
        }
        ignored
    }

    fn rules_for(&mut self, dir: &str) -> &[IgnoreRule] {
        if !self.cache.contains_key(dir) {
            let rules = self.load_rules(dir);
            self.cache.insert(dir.to_string(), rules);
        }
        self.cache.get(dir).map(Vec::as_slice).unwrap_or(&[])
    }

    fn load_rules(&self, dir: &str) -> Vec<IgnoreRule> {
        let path = self.root.join(dir).join(&self.file_name);
        let text = match self.fs.read_optional(&path) {
            Ok(Some(text)) => text,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(path = ?path, error = %e, "unreadable ignore file; ignoring it");
                return Vec::new();
            }
        };

        let mut rules = Vec::new();
        for line in text.lines() {
            match IgnoreRule::parse(line) {
                Ok(Some(rule)) => rules.push(rule),
                Ok(None) => {}
                Err(e) => warn!(path = ?path, error = %e, "skipping invalid ignore pattern"),
            }
        }
        debug!(path = ?path, rules = rules.len(), "loaded ignore file");
        rules
    }
}

/// Repository-relative directories containing `rel_path`, root first.
fn ancestor_dirs(rel_path: &str) -> Vec<String> {
    let mut dirs = vec![String::new()];
    let parent = Path::new(rel_path).parent();
    if let Some(parent) = parent {
        let mut acc = String::new();
        for component in parent.components() {
            let part = component.as_os_str().to_string_lossy();
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(&part);
            dirs.push(acc.clone());
        }
    }
    dirs
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
