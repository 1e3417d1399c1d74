use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use monobuild::engine::{BuildContext, StepExecutor, StepOutcome};
use monobuild::jobs::BoxFuture;
use monobuild::types::Artifact;

/// A fake step executor that:
/// - records which artifacts were "built", in order, with their context
/// - succeeds for every artifact except the ones marked as failing.
///
/// Clones share their records, so keep a clone around after handing one to
/// `StepExecutors`.
#[derive(Clone, Default)]
pub struct FakeStepExecutor {
    executed: Arc<Mutex<Vec<(String, BuildContext)>>>,
    failing: Arc<Mutex<BTreeSet<String>>>,
}

impl FakeStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, names: &[&str]) -> Self {
        self.failing
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Names of the built artifacts, in build order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Context passed for the (last) build of `name`.
    pub fn context_of(&self, name: &str) -> Option<BuildContext> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, ctx)| ctx.clone())
    }
}

impl StepExecutor for FakeStepExecutor {
    fn execute<'a>(
        &'a self,
        artifact: &'a Artifact,
        ctx: &'a BuildContext,
    ) -> BoxFuture<'a, StepOutcome> {
        Box::pin(async move {
            self.executed
                .lock()
                .unwrap()
                .push((artifact.name.clone(), ctx.clone()));

            if self.failing.lock().unwrap().contains(&artifact.name) {
                StepOutcome::failure()
            } else {
                StepOutcome::success()
            }
        })
    }
}
