// src/events.rs

//! Synchronous in-process event bus.
//!
//! The dispatcher announces job lifecycle transitions and the repository
//! build announces its start and end. Subscribers run on the publishing
//! thread, in subscription order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::jobs::{Job, JobId};
use crate::types::{ArtifactName, BuildResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    StartJob,
    EndJob,
    AwakenJob,
    HibernateJob,
    StartingRepoJob,
    FinishingRepoJob,
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventName::StartJob => "START_JOB",
            EventName::EndJob => "END_JOB",
            EventName::AwakenJob => "AWAKEN_JOB",
            EventName::HibernateJob => "HIBERNATE_JOB",
            EventName::StartingRepoJob => "STARTING_REPO_JOB",
            EventName::FinishingRepoJob => "FINISHING_REPO_JOB",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// A job is about to run for the first time.
    StartJob { job: Job },
    /// A job finished and will not run again. `error` is set when its
    /// handler failed instead of returning a result.
    EndJob {
        job: Job,
        success: bool,
        error: Option<String>,
    },
    /// A suspended job is about to resume.
    AwakenJob { job: Job, child: JobId },
    /// A job suspended waiting on a child.
    HibernateJob { job: Job },
    StartingRepoJob {
        job_id: JobId,
        artifacts_to_be_built: BTreeSet<ArtifactName>,
    },
    FinishingRepoJob {
        job_id: JobId,
        already_built_artifacts: BTreeSet<ArtifactName>,
        results: BTreeMap<ArtifactName, BuildResult>,
    },
}

impl BuildEvent {
    pub fn name(&self) -> EventName {
        match self {
            BuildEvent::StartJob { .. } => EventName::StartJob,
            BuildEvent::EndJob { .. } => EventName::EndJob,
            BuildEvent::AwakenJob { .. } => EventName::AwakenJob,
            BuildEvent::HibernateJob { .. } => EventName::HibernateJob,
            BuildEvent::StartingRepoJob { .. } => EventName::StartingRepoJob,
            BuildEvent::FinishingRepoJob { .. } => EventName::FinishingRepoJob,
        }
    }
}

type Handler = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    by_name: BTreeMap<EventName, Vec<(u64, Handler)>>,
}

/// Cheaply clonable handle to a shared set of subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(&BuildEvent) + Send + Sync + 'static,
    {
        let id = match self.subscribers.lock() {
            Ok(mut subs) => {
                subs.next_id += 1;
                let id = subs.next_id;
                subs.by_name
                    .entry(name)
                    .or_default()
                    .push((id, Arc::new(handler)));
                id
            }
            Err(_) => {
                warn!(event = %name, "event bus lock poisoned; subscription dropped");
                0
            }
        };
        Subscription {
            bus: self.clone(),
            name,
            id,
        }
    }

    pub fn publish(&self, event: BuildEvent) {
        let name = event.name();
        debug!(event = %name, "publishing event");

        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let handlers: Vec<Handler> = match self.subscribers.lock() {
            Ok(subs) => subs
                .by_name
                .get(&name)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default(),
            Err(_) => {
                warn!(event = %name, "event bus lock poisoned; event dropped");
                return;
            }
        };

        for handler in handlers {
            handler(&event);
        }
    }

    fn remove(&self, name: EventName, id: u64) {
        if let Ok(mut subs) = self.subscribers.lock() {
            if let Some(list) = subs.by_name.get_mut(&name) {
                list.retain(|(sid, _)| *sid != id);
            }
        }
    }
}

/// Returned by [`EventBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    bus: EventBus,
    name: EventName,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.bus.remove(self.name, self.id);
    }
}
