// src/jobs/dispatcher.rs

use std::collections::{BTreeMap, BTreeSet};

use anyhow::anyhow;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::errors::{MonobuildError, Result};
use crate::events::{BuildEvent, EventBus};
use crate::jobs::registry::{HandlerRegistry, JobContext};
use crate::jobs::store::{awaiting_key, awaken_key, state_key, JobStore, QueuedJob, StoreOp};
use crate::jobs::{AwakenedFrom, ChildResult, Job, JobId, JobResult};

/// What a drain of the queue did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Queue entries processed.
    pub steps: usize,
    /// Jobs that completed during the drain, with their success flag.
    pub finished: BTreeMap<JobId, bool>,
}

impl DrainSummary {
    pub fn outcome(&self, id: &JobId) -> Option<bool> {
        self.finished.get(id).copied()
    }
}

/// Drains a [`JobStore`] queue one entry at a time.
///
/// A job stays suspended while any child it dispatched with `awaken` is
/// still running, whichever step dispatched it. When such a child
/// completes, its parent is re-queued with the child's result attached as
/// [`AwakenedFrom`]. The job completes on the first step that leaves it
/// with no outstanding children.
#[derive(Debug)]
pub struct JobDispatcher<S: JobStore> {
    store: S,
    handlers: HandlerRegistry,
    events: EventBus,
}

impl<S: JobStore> JobDispatcher<S> {
    pub fn new(store: S, handlers: HandlerRegistry, events: EventBus) -> Self {
        Self {
            store,
            handlers,
            events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Queue a job. Top-level jobs pass `None` for `awakened_from`.
    pub fn dispatch(&self, job: Job, awakened_from: Option<AwakenedFrom>) -> Result<JobId> {
        let id = job.id;
        info!(job_id = %id, kind = %job.kind.name(), "dispatching job");
        self.store.enqueue(job, awakened_from)?;
        Ok(id)
    }

    /// Process entries until the queue is empty.
    pub async fn run_until_idle(&self) -> Result<DrainSummary> {
        self.run_steps(usize::MAX).await
    }

    /// Process at most `max_steps` entries.
    ///
    /// Stops early only on storage errors; the entry being processed then
    /// stays queued.
    pub async fn run_steps(&self, max_steps: usize) -> Result<DrainSummary> {
        let mut summary = DrainSummary::default();

        while summary.steps < max_steps {
            let Some(entry) = self.store.peek()? else {
                debug!("job queue is empty");
                break;
            };
            let job_id = entry.job.id;
            match self.process(entry).await {
                Ok(Some(success)) => {
                    summary.finished.insert(job_id, success);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "job storage failed; leaving the entry queued");
                    return Err(e);
                }
            }
            summary.steps += 1;
        }

        Ok(summary)
    }

    /// Run one queue entry and commit its effects.
    ///
    /// Returns `Some(success)` if the job completed, `None` if it suspended.
    async fn process(&self, entry: QueuedJob) -> Result<Option<bool>> {
        let QueuedJob {
            seq,
            job,
            awakened_from,
        } = entry;

        let persisted_state = self.store.get(&state_key(&job.id))?;
        let mut outstanding = self.outstanding_children(&job.id)?;
        if let Some(from) = &awakened_from {
            outstanding.remove(&from.job.id);
        }

        match &awakened_from {
            Some(from) => {
                debug!(job_id = %job.id, child = %from.job.id, "awakening job");
                self.events.publish(BuildEvent::AwakenJob {
                    job: job.clone(),
                    child: from.job.id,
                });
            }
            None => {
                debug!(job_id = %job.id, kind = %job.kind.name(), "starting job");
                self.events.publish(BuildEvent::StartJob { job: job.clone() });
            }
        }

        let (result, failure) = match self
            .run_handler(&job, awakened_from.as_ref(), persisted_state)
            .await
        {
            Ok(result) => (result, None),
            Err(e) if e.is_storage() => return Err(e),
            Err(e) => {
                warn!(job_id = %job.id, kind = %job.kind.name(), error = %e, "job handler failed");
                (JobResult::failure(), Some(e.to_string()))
            }
        };

        let mut ops = Vec::new();
        let mut children = Vec::with_capacity(result.sub_jobs.len());

        for sub in result.sub_jobs {
            let mut child = sub.job;
            if sub.awaken {
                child.parent_waiting_id = Some(job.id);
                outstanding.insert(child.id);
                ops.push(StoreOp::Put {
                    key: awaken_key(&child.id),
                    value: serde_json::to_value(&job)?,
                });
            }
            children.push(child);
        }

        let suspended = !outstanding.is_empty();
        if suspended {
            ops.push(StoreOp::Put {
                key: awaiting_key(&job.id),
                value: serde_json::to_value(&outstanding)?,
            });
            if let Some(state) = result.state_to_persist {
                ops.push(StoreOp::Put {
                    key: state_key(&job.id),
                    value: state,
                });
            }
        } else {
            ops.push(StoreOp::Delete {
                key: awaiting_key(&job.id),
            });
            ops.push(StoreOp::Delete {
                key: state_key(&job.id),
            });

            let awaken = awaken_key(&job.id);
            if let Some(parent) = self.store.get(&awaken)? {
                let parent: Job = serde_json::from_value(parent)?;
                debug!(job_id = %job.id, parent = %parent.id, "re-dispatching waiting parent");
                ops.push(StoreOp::Delete { key: awaken });
                ops.push(StoreOp::Enqueue {
                    job: parent,
                    awakened_from: Some(AwakenedFrom {
                        job: job.clone(),
                        result: ChildResult {
                            success: result.success,
                            state: result.state_to_persist,
                        },
                    }),
                });
            }
        }

        for child in children {
            ops.push(StoreOp::Enqueue {
                job: child,
                awakened_from: None,
            });
        }
        ops.push(StoreOp::Ack { seq });

        self.store.apply(ops)?;

        if suspended {
            debug!(job_id = %job.id, waiting_on = outstanding.len(), "job hibernating");
            self.events.publish(BuildEvent::HibernateJob { job });
            Ok(None)
        } else {
            info!(job_id = %job.id, kind = %job.kind.name(), success = result.success, "job finished");
            let success = result.success;
            self.events.publish(BuildEvent::EndJob {
                job,
                success,
                error: failure,
            });
            Ok(Some(success))
        }
    }

    async fn run_handler(
        &self,
        job: &Job,
        awakened_from: Option<&AwakenedFrom>,
        persisted_state: Option<Value>,
    ) -> Result<JobResult> {
        let handler = self.handlers.get(job.kind.tag()).ok_or_else(|| {
            MonobuildError::Other(anyhow!("no handler registered for {:?} jobs", job.kind.tag()))
        })?;

        handler
            .handle(JobContext {
                job,
                awakened_from,
                persisted_state,
                events: &self.events,
            })
            .await
    }

    fn outstanding_children(&self, id: &JobId) -> Result<BTreeSet<JobId>> {
        match self.store.get(&awaiting_key(id))? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeSet::new()),
        }
    }
}
