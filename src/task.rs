//! Task definition and submission handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::progress::ProgressReporter;

/// Identifies one submission. Doubles as the in-flight registry key.
pub type TaskId = Uuid;

/// The value a callable returns on success. Plain data only; this crosses
/// the worker/control boundary.
pub type TaskValue = serde_json::Value;

/// The unit of work. Runs once on a background worker, may emit progress
/// through the reporter, and signals failure by returning `Err`. Panics are
/// caught by the dispatcher and converted to failures.
pub type Callable = Box<dyn FnOnce(&ProgressReporter) -> anyhow::Result<TaskValue> + Send + 'static>;

/// An owned, immutable-once-submitted unit of work.
///
/// # Examples
///
/// ```rust
/// use dispatch_core::Task;
/// use std::time::Duration;
///
/// let task = Task::new("add", |_progress| Ok(serde_json::json!(2 + 3)))
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(task.name(), "add");
/// ```
pub struct Task {
    pub(crate) name: String,
    pub(crate) callable: Callable,
    pub(crate) timeout: Option<Duration>,
}

impl Task {
    pub fn new<F>(name: impl Into<String>, callable: F) -> Self
    where
        F: FnOnce(&ProgressReporter) -> anyhow::Result<TaskValue> + Send + 'static,
    {
        Self {
            name: name.into(),
            callable: Box::new(callable),
            timeout: None,
        }
    }

    /// Override the dispatcher's default time budget for this task.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// The callable is opaque; render everything else.
impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Handle returned from a successful submission.
///
/// Carries the task id and a cooperative cancellation flag. Cancellation is
/// best-effort: the callable must observe
/// [`ProgressReporter::is_cancelled`](crate::ProgressReporter::is_cancelled)
/// for it to take effect; nothing is preempted.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task_id: TaskId,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub(crate) fn new(task_id: TaskId, cancelled: Arc<AtomicBool>) -> Self {
        Self { task_id, cancelled }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_construction() {
        let task = Task::new("add", |_progress| Ok(serde_json::json!(5)));
        assert_eq!(task.name(), "add");
        assert!(task.timeout.is_none());

        let task = task.with_timeout(Duration::from_millis(250));
        assert_eq!(task.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_handle_cancellation_flag() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TaskHandle::new(Uuid::new_v4(), cancelled.clone());

        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(cancelled.load(Ordering::Acquire));
    }
}
