// src/jobs/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::Result;
use crate::events::EventBus;
use crate::jobs::{AwakenedFrom, Job, JobKindTag, JobResult};

pub use crate::types::BoxFuture;

/// Everything a handler sees for one step of a job.
#[derive(Debug)]
pub struct JobContext<'a> {
    pub job: &'a Job,
    /// Set when the job is resuming after a child completed.
    pub awakened_from: Option<&'a AwakenedFrom>,
    /// State the job persisted when it last suspended.
    pub persisted_state: Option<Value>,
    pub events: &'a EventBus,
}

/// Runs one step of a job.
///
/// A job that did not succeed returns `Ok` with `success == false`.
/// Returning `Err` (corrupt state, cyclic graph) also fails the job, and
/// the error is reported with its `END_JOB` event. Only storage errors stop
/// the dispatcher and leave the job queued.
pub trait JobHandler: Send + Sync {
    fn handle<'a>(&'a self, ctx: JobContext<'a>) -> BoxFuture<'a, Result<JobResult>>;
}

/// Job kind to handler table, built once at startup.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKindTag, Arc<dyn JobHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: JobKindTag, handler: impl JobHandler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    pub fn get(&self, kind: JobKindTag) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }
}
