use std::future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use monobuild::changes::VcsBackend;
use monobuild::types::BoxFuture;

#[derive(Debug, Default)]
struct State {
    /// Commits, oldest first, with the files each one touched.
    commits: Vec<(String, Vec<String>)>,
    workspace: Vec<String>,
    broken: bool,
}

/// In-memory repository history.
///
/// Clones share the same history, so a test can keep a handle after
/// passing one to a `ChangeDetector`.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    state: Arc<Mutex<State>>,
}

impl FakeVcs {
    /// A repository with a single initial commit `c0`.
    pub fn new() -> Self {
        let vcs = Self {
            state: Arc::new(Mutex::new(State::default())),
        };
        vcs.commit("c0", &[]);
        vcs
    }

    /// Add a commit touching `files` and check it out.
    pub fn commit(&self, id: &str, files: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .commits
            .push((id.to_string(), files.iter().map(|f| f.to_string()).collect()));
    }

    /// Replace the set of uncommitted changes.
    pub fn set_workspace(&self, files: &[&str]) {
        self.state.lock().unwrap().workspace = files.iter().map(|f| f.to_string()).collect();
    }

    /// Make every query fail.
    pub fn break_it(&self) {
        self.state.lock().unwrap().broken = true;
    }
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVcs {
    fn head(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.broken {
            bail!("fake vcs is broken");
        }
        state
            .commits
            .last()
            .map(|(id, _)| id.clone())
            .ok_or_else(|| anyhow!("no commits"))
    }

    fn touched_between(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.broken {
            bail!("fake vcs is broken");
        }
        let position = |id: &str| {
            state
                .commits
                .iter()
                .position(|(c, _)| c == id)
                .ok_or_else(|| anyhow!("unknown commit {id}"))
        };
        let (start, end) = (position(from)?, position(to)?);

        let mut files: Vec<String> = state.commits[start + 1..=end]
            .iter()
            .flat_map(|(_, files)| files.iter().cloned())
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn workspace(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.broken {
            bail!("fake vcs is broken");
        }
        Ok(state.workspace.clone())
    }
}

impl VcsBackend for FakeVcs {
    fn head_commit<'a>(&'a self, _repo: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(future::ready(self.head()))
    }

    fn changed_files_between<'a>(
        &'a self,
        _repo: &'a Path,
        from: &'a str,
        to: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(future::ready(self.touched_between(from, to)))
    }

    fn workspace_changes<'a>(&'a self, _repo: &'a Path) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(future::ready(self.workspace()))
    }
}
