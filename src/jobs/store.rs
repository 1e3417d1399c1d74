// src/jobs/store.rs

//! Durable job queue plus key/value state.
//!
//! The dispatcher never pops a queue entry before its handler has run.
//! It peeks at the front entry, runs the handler, and commits everything
//! the step produced (state, continuations, new entries, the ack) as one
//! [`JobStore::apply`] batch. A crash at any point before the batch lands
//! simply replays the same entry.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{MonobuildError, Result};
use crate::jobs::{AwakenedFrom, Job, JobId};

/// Key holding the persisted state of a suspended job.
pub fn state_key(id: &JobId) -> String {
    format!("jobstate:{id}")
}

/// Key holding the parent job waiting on child `id`.
pub fn awaken_key(id: &JobId) -> String {
    format!("awaken:{id}")
}

/// Key holding the ids of the children job `id` is still waiting on.
pub fn awaiting_key(id: &JobId) -> String {
    format!("awaiting:{id}")
}

/// A job waiting in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Monotonic position in the queue.
    pub seq: u64,
    pub job: Job,
    #[serde(default)]
    pub awakened_from: Option<AwakenedFrom>,
}

/// One mutation in an atomic [`JobStore::apply`] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Put { key: String, value: Value },
    Delete { key: String },
    Enqueue {
        job: Job,
        awakened_from: Option<AwakenedFrom>,
    },
    /// Remove a processed entry from the queue.
    Ack { seq: u64 },
}

/// Storage behind the [`crate::jobs::JobDispatcher`].
///
/// Implementations must apply each batch atomically: after a crash either
/// every op of a batch is visible or none is.
pub trait JobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Oldest entry of the queue, without removing it.
    fn peek(&self) -> Result<Option<QueuedJob>>;

    /// Every queued entry, oldest first.
    fn pending(&self) -> Result<Vec<QueuedJob>>;

    fn apply(&self, ops: Vec<StoreOp>) -> Result<()>;

    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.apply(vec![StoreOp::Put {
            key: key.to_string(),
            value,
        }])
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.apply(vec![StoreOp::Delete {
            key: key.to_string(),
        }])
    }

    fn enqueue(&self, job: Job, awakened_from: Option<AwakenedFrom>) -> Result<()> {
        self.apply(vec![StoreOp::Enqueue { job, awakened_from }])
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    kv: BTreeMap<String, Value>,
    queue: VecDeque<QueuedJob>,
    next_seq: u64,
}

/// In-process [`JobStore`].
///
/// Clones share the same data, so dropping a dispatcher and building a
/// new one over a clone behaves like re-opening a durable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| MonobuildError::Other(anyhow!("job store lock poisoned")))
    }
}

impl JobStore for MemoryJobStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.kv.get(key).cloned())
    }

    fn peek(&self) -> Result<Option<QueuedJob>> {
        Ok(self.lock()?.queue.front().cloned())
    }

    fn pending(&self) -> Result<Vec<QueuedJob>> {
        Ok(self.lock()?.queue.iter().cloned().collect())
    }

    fn apply(&self, ops: Vec<StoreOp>) -> Result<()> {
        let mut inner = self.lock()?;
        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    inner.kv.insert(key, value);
                }
                StoreOp::Delete { key } => {
                    inner.kv.remove(&key);
                }
                StoreOp::Enqueue { job, awakened_from } => {
                    inner.next_seq += 1;
                    let seq = inner.next_seq;
                    inner.queue.push_back(QueuedJob {
                        seq,
                        job,
                        awakened_from,
                    });
                }
                StoreOp::Ack { seq } => {
                    let before = inner.queue.len();
                    inner.queue.retain(|entry| entry.seq != seq);
                    if inner.queue.len() == before {
                        warn!(seq, "ack for unknown queue entry");
                    }
                }
            }
        }
        Ok(())
    }
}
