//! Task dispatcher: submission, supervision, and exactly-once delivery.
//!
//! `submit` is synchronous and non-blocking; everything that can take time
//! happens on a per-task supervisor spawned onto the runtime, which runs the
//! callable on a blocking worker and feeds the delivery channel. For every
//! admitted task the supervisor emits exactly one terminal outcome followed
//! by exactly one finished notification, regardless of how the callable ends.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::delivery::{Delivery, DeliveryEvent, DeliveryQueue, TaskCallbacks, TaskRecord};
use crate::error::{DispatchError, Result};
use crate::guard::AdmissionGuard;
use crate::logging::{log_error, log_task_operation};
use crate::outcome::{ErrorKind, Outcome, TaskFailure};
use crate::progress::ProgressReporter;
use crate::task::{Callable, Task, TaskHandle, TaskId, TaskValue};

/// Accepts units of work and runs them on a bounded background pool.
///
/// Created together with its [`DeliveryQueue`]; the dispatcher side may be
/// cloned and shared freely, the queue side belongs to the one control
/// context that owns callback state.
///
/// # Examples
///
/// ```rust,no_run
/// use dispatch_core::{DispatcherConfig, Task, TaskCallbacks, TaskDispatcher};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (dispatcher, mut delivery) = TaskDispatcher::new(DispatcherConfig::default());
///
/// let task = Task::new("add", |_progress| Ok(serde_json::json!(2 + 3)));
/// let callbacks = TaskCallbacks::new()
///     .on_success(|value| println!("result = {value}"))
///     .on_finished(|| println!("task finished"));
///
/// dispatcher.submit(task, callbacks)?;
/// delivery.drain_until_finished(1).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TaskDispatcher {
    config: DispatcherConfig,

    /// In-flight tasks by id; entries removed on finished delivery.
    registry: Arc<DashMap<TaskId, TaskRecord>>,

    /// Worker-to-control notification channel.
    delivery_tx: mpsc::UnboundedSender<Delivery>,

    /// Background pool capacity.
    pool: Arc<Semaphore>,

    /// Single-admission guard, when configured.
    guard: Option<Arc<AdmissionGuard>>,

    stats: Arc<StatsInner>,
}

impl TaskDispatcher {
    /// Create a dispatcher and the delivery queue the control context drains.
    ///
    /// Must be called within a tokio runtime; supervisors are spawned onto it.
    pub fn new(config: DispatcherConfig) -> (Self, DeliveryQueue) {
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(DashMap::new());

        let dispatcher = Self {
            pool: Arc::new(Semaphore::new(config.worker_threads)),
            guard: config
                .single_admission
                .then(|| Arc::new(AdmissionGuard::new())),
            registry: registry.clone(),
            delivery_tx,
            stats: Arc::new(StatsInner::default()),
            config,
        };

        info!(
            worker_threads = dispatcher.config.worker_threads,
            single_admission = dispatcher.config.single_admission,
            "TaskDispatcher created"
        );

        let queue = DeliveryQueue::new(delivery_rx, registry);
        (dispatcher, queue)
    }

    /// Submit a task for background execution. Returns immediately.
    ///
    /// Fails synchronously with [`DispatchError::AdmissionDenied`] when the
    /// admission guard is configured and held by another in-flight task.
    /// Every other failure mode is asynchronous and arrives through
    /// `on_failure` followed by `on_finished`.
    pub fn submit(&self, task: Task, callbacks: TaskCallbacks) -> Result<TaskHandle> {
        if let Some(guard) = &self.guard {
            if !guard.try_acquire() {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                log_task_operation(
                    "submit",
                    None,
                    Some(task.name()),
                    "rejected",
                    Some("admission guard held"),
                );
                return Err(DispatchError::AdmissionDenied);
            }
        }

        let task_id = Uuid::new_v4();
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TaskHandle::new(task_id, cancelled.clone());
        let timeout = task.timeout.or(self.config.default_timeout());

        self.registry.insert(
            task_id,
            TaskRecord {
                name: task.name().to_string(),
                callbacks,
            },
        );
        if self.registry.len() > self.config.registry_capacity_warning {
            warn!(
                in_flight = self.registry.len(),
                threshold = self.config.registry_capacity_warning,
                "In-flight registry unusually large"
            );
        }

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        log_task_operation("submit", Some(task_id), Some(task.name()), "accepted", None);

        let dispatcher = self.clone();
        let Task { callable, .. } = task;
        tokio::spawn(async move {
            dispatcher
                .supervise(task_id, callable, timeout, cancelled)
                .await;
        });

        Ok(handle)
    }

    /// Snapshot of dispatcher counters.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            succeeded: self.stats.succeeded.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            in_flight: self.registry.len(),
        }
    }

    /// Per-task supervisor. Runs on the runtime, never on the control context.
    async fn supervise(
        &self,
        task_id: TaskId,
        callable: Callable,
        timeout: Option<Duration>,
        cancelled: Arc<AtomicBool>,
    ) {
        let permit = match self.pool.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(task_id = %task_id, "No worker slot available");
                let outcome = Outcome::Failure(TaskFailure {
                    kind: ErrorKind::ExecutionContextUnavailable,
                    message: "background pool exhausted".to_string(),
                    trace: format!("no worker slot available for task {task_id}"),
                });
                self.finish(task_id, outcome);
                return;
            }
        };

        let reporter = ProgressReporter::new(task_id, self.delivery_tx.clone(), cancelled);
        let worker = tokio::task::spawn_blocking(move || {
            catch_unwind(AssertUnwindSafe(move || callable(&reporter)))
        });

        let outcome = match timeout {
            Some(budget) => {
                tokio::select! {
                    joined = worker => outcome_from_join(joined),
                    _ = tokio::time::sleep(budget) => {
                        warn!(task_id = %task_id, budget_ms = budget.as_millis() as u64, "Task exceeded time budget");
                        Outcome::Failure(TaskFailure {
                            kind: ErrorKind::ExecutionContextUnavailable,
                            message: format!("task exceeded {}ms time budget", budget.as_millis()),
                            trace: format!(
                                "worker for task {task_id} still running after {}ms; its result will be discarded",
                                budget.as_millis()
                            ),
                        })
                    }
                }
            }
            None => outcome_from_join(worker.await),
        };

        drop(permit);
        self.finish(task_id, outcome);
    }

    /// Emit the terminal outcome then the finished notification, release the
    /// guard, and settle the counters. The single place terminal events leave
    /// the dispatcher, so exactly-once holds for every path.
    fn finish(&self, task_id: TaskId, outcome: Outcome) {
        // The task is no longer in flight once its outcome exists; release
        // the guard before delivery so a submission observing `on_finished`
        // is always admitted.
        if let Some(guard) = &self.guard {
            guard.release();
        }

        match &outcome {
            Outcome::Success(_) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                log_task_operation("complete", Some(task_id), None, "success", None);
            }
            Outcome::Failure(failure) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log_error(
                    "dispatcher",
                    "complete",
                    &failure.message,
                    Some(&task_id.to_string()),
                );
            }
        }

        // Failed sends mean the delivery queue is gone; see ProgressReporter.
        let _ = self.delivery_tx.send(Delivery {
            task_id,
            event: DeliveryEvent::Terminal(outcome),
        });
        let _ = self.delivery_tx.send(Delivery {
            task_id,
            event: DeliveryEvent::Finished,
        });
    }
}

/// Map the blocking worker's join result to a terminal outcome.
fn outcome_from_join(
    joined: std::result::Result<
        std::thread::Result<anyhow::Result<TaskValue>>,
        JoinError,
    >,
) -> Outcome {
    match joined {
        Ok(Ok(Ok(value))) => Outcome::Success(value),
        Ok(Ok(Err(error))) => Outcome::Failure(TaskFailure {
            kind: ErrorKind::UserCallableError,
            message: error.to_string(),
            // anyhow's alternate debug output carries the full cause chain.
            trace: format!("{error:?}"),
        }),
        Ok(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            Outcome::Failure(TaskFailure {
                kind: ErrorKind::UserCallableError,
                trace: format!("callable panicked: {message}"),
                message,
            })
        }
        Err(join_error) => Outcome::Failure(TaskFailure {
            kind: ErrorKind::ExecutionContextUnavailable,
            message: join_error.to_string(),
            trace: format!("{join_error:?}"),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "callable panicked with non-string payload".to_string()
    }
}

/// Dispatcher counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub in_flight: usize,
}

#[derive(Debug, Default)]
struct StatsInner {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_stats_track_submissions() {
        let (dispatcher, mut delivery) = TaskDispatcher::new(DispatcherConfig::default());

        dispatcher
            .submit(
                Task::new("ok", |_progress| Ok(json!(1))),
                TaskCallbacks::new(),
            )
            .unwrap();
        dispatcher
            .submit(
                Task::new("fail", |_progress| Err(anyhow::anyhow!("boom"))),
                TaskCallbacks::new(),
            )
            .unwrap();
        delivery.drain_until_finished(2).await;

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_pool_exhaustion_reported_as_failure() {
        let config = DispatcherConfig {
            worker_threads: 0,
            ..DispatcherConfig::default()
        };
        let (dispatcher, mut delivery) = TaskDispatcher::new(config);

        let (failure_tx, failure_rx) = std::sync::mpsc::channel();
        let callbacks = TaskCallbacks::new().on_failure(move |failure| {
            failure_tx.send(failure).unwrap();
        });

        dispatcher
            .submit(Task::new("starved", |_progress| Ok(json!(1))), callbacks)
            .unwrap();
        delivery.drain_until_finished(1).await;

        let failure = failure_rx.try_recv().unwrap();
        assert_eq!(failure.kind, ErrorKind::ExecutionContextUnavailable);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static str panic");
        assert_eq!(panic_message(payload.as_ref()), "static str panic");

        let payload: Box<dyn Any + Send> = Box::new("owned panic".to_string());
        assert_eq!(panic_message(payload.as_ref()), "owned panic");

        let payload: Box<dyn Any + Send> = Box::new(17u32);
        assert_eq!(
            panic_message(payload.as_ref()),
            "callable panicked with non-string payload"
        );
    }
}
