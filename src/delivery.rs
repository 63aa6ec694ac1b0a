//! Worker-to-control delivery channel.
//!
//! Notifications cross the thread boundary as messages on a single mpsc
//! channel rather than through any implicit thread-affinity dispatch. The
//! channel is FIFO per sender, which gives each task its ordering contract:
//! progress* -> terminal -> finished.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::outcome::{Outcome, ProgressEvent, TaskFailure};
use crate::task::{TaskId, TaskValue};

/// One notification in flight from a worker to the control context.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub task_id: TaskId,
    pub event: DeliveryEvent,
}

#[derive(Debug)]
pub(crate) enum DeliveryEvent {
    Progress(ProgressEvent),
    Terminal(Outcome),
    Finished,
}

pub type ProgressFn = Box<dyn FnMut(&ProgressEvent) + Send + Sync>;
pub type SuccessFn = Box<dyn FnOnce(TaskValue) + Send + Sync>;
pub type FailureFn = Box<dyn FnOnce(TaskFailure) + Send + Sync>;
pub type FinishedFn = Box<dyn FnOnce() + Send + Sync>;

/// Callbacks registered at submission and invoked on the control context.
///
/// All callbacks are optional; an unregistered callback drops the
/// corresponding notification. `on_finished` fires after the terminal
/// callback regardless of outcome, so it must not be read as success.
#[derive(Default)]
pub struct TaskCallbacks {
    pub(crate) on_progress: Option<ProgressFn>,
    pub(crate) on_success: Option<SuccessFn>,
    pub(crate) on_failure: Option<FailureFn>,
    pub(crate) on_finished: Option<FinishedFn>,
}

impl TaskCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(
        mut self,
        callback: impl FnMut(&ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(TaskValue) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_failure(
        mut self,
        callback: impl FnOnce(TaskFailure) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    pub fn on_finished(mut self, callback: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_finished = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for TaskCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_finished", &self.on_finished.is_some())
            .finish()
    }
}

/// In-flight registry entry. Removed on finished delivery, so the registry
/// stays bounded by the number of running tasks.
pub(crate) struct TaskRecord {
    pub name: String,
    pub callbacks: TaskCallbacks,
}

/// What [`DeliveryQueue::deliver_next`] just did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveredEvent {
    Progress(TaskId),
    Terminal(TaskId),
    Finished(TaskId),
    /// A notification arrived for a task no longer in the registry, e.g.
    /// progress from a callable still running after its time budget expired.
    Dropped(TaskId),
}

/// Control-context side of the delivery channel.
///
/// Exactly one `DeliveryQueue` exists per dispatcher; whichever context
/// drains it owns all callback state, so callbacks never race each other.
pub struct DeliveryQueue {
    rx: mpsc::UnboundedReceiver<Delivery>,
    registry: Arc<DashMap<TaskId, TaskRecord>>,
}

impl DeliveryQueue {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Delivery>,
        registry: Arc<DashMap<TaskId, TaskRecord>>,
    ) -> Self {
        Self { rx, registry }
    }

    /// Receive and deliver the next notification, invoking the matching
    /// callback. Returns `None` once the dispatcher and all workers are gone.
    pub async fn deliver_next(&mut self) -> Option<DeliveredEvent> {
        let Delivery { task_id, event } = self.rx.recv().await?;

        match event {
            DeliveryEvent::Progress(progress) => {
                // Take the callback out of the registry before invoking it so
                // a callback that submits new work never re-enters the map.
                let callback = self
                    .registry
                    .get_mut(&task_id)
                    .and_then(|mut record| record.callbacks.on_progress.take());

                match callback {
                    Some(mut callback) => {
                        callback(&progress);
                        if let Some(mut record) = self.registry.get_mut(&task_id) {
                            record.callbacks.on_progress = Some(callback);
                        }
                        Some(DeliveredEvent::Progress(task_id))
                    }
                    None if self.registry.contains_key(&task_id) => {
                        Some(DeliveredEvent::Progress(task_id))
                    }
                    None => {
                        debug!(task_id = %task_id, sequence = progress.sequence, "Dropping late progress event");
                        Some(DeliveredEvent::Dropped(task_id))
                    }
                }
            }
            DeliveryEvent::Terminal(outcome) => {
                let Some(mut record) = self.registry.get_mut(&task_id) else {
                    warn!(task_id = %task_id, "Dropping terminal outcome for unknown task");
                    return Some(DeliveredEvent::Dropped(task_id));
                };

                let callback = match &outcome {
                    Outcome::Success(_) => record.callbacks.on_success.take().map(Terminal::Success),
                    Outcome::Failure(_) => record.callbacks.on_failure.take().map(Terminal::Failure),
                };
                drop(record);

                match (outcome, callback) {
                    (Outcome::Success(value), Some(Terminal::Success(callback))) => callback(value),
                    (Outcome::Failure(failure), Some(Terminal::Failure(callback))) => {
                        callback(failure)
                    }
                    _ => {}
                }
                Some(DeliveredEvent::Terminal(task_id))
            }
            DeliveryEvent::Finished => match self.registry.remove(&task_id) {
                Some((_, record)) => {
                    debug!(task_id = %task_id, task_name = %record.name, "Task finished");
                    if let Some(callback) = record.callbacks.on_finished {
                        callback();
                    }
                    Some(DeliveredEvent::Finished(task_id))
                }
                None => {
                    warn!(task_id = %task_id, "Dropping duplicate finished notification");
                    Some(DeliveredEvent::Dropped(task_id))
                }
            },
        }
    }

    /// Deliver notifications until `count` tasks have finished or the
    /// channel closes.
    pub async fn drain_until_finished(&mut self, count: usize) {
        let mut finished = 0;
        while finished < count {
            match self.deliver_next().await {
                Some(DeliveredEvent::Finished(_)) => finished += 1,
                Some(_) => {}
                None => break,
            }
        }
    }
}

enum Terminal {
    Success(SuccessFn),
    Failure(FailureFn),
}
