//! Task outcome and progress data.
//!
//! Everything in this module is plain data: it is produced on a background
//! worker and inspected by the control context after the worker has moved on,
//! so nothing here may borrow from worker-owned state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskValue;

/// Failure classification surfaced through `on_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The callable returned an error or panicked; message and trace are
    /// captured verbatim.
    UserCallableError,

    /// The admission guard was already held at submission time.
    AdmissionDenied,

    /// The background execution context was exhausted, unavailable, or the
    /// task exceeded its time budget.
    ExecutionContextUnavailable,
}

/// A captured task failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: String,
}

/// The single terminal outcome of a task. Produced exactly once, never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success(TaskValue),
    Failure(TaskFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

/// Progress payloads are restricted to plain text or counter values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPayload {
    Text(String),
    Counter(i64),
}

impl From<String> for ProgressPayload {
    fn from(text: String) -> Self {
        ProgressPayload::Text(text)
    }
}

impl From<&str> for ProgressPayload {
    fn from(text: &str) -> Self {
        ProgressPayload::Text(text.to_string())
    }
}

impl From<i64> for ProgressPayload {
    fn from(counter: i64) -> Self {
        ProgressPayload::Counter(counter)
    }
}

/// One intermediate progress notification.
///
/// Sequence numbers are strictly increasing within a task; no ordering is
/// promised across tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub sequence: u64,
    pub payload: ProgressPayload,
    pub emitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_helpers() {
        assert!(Outcome::Success(json!(5)).is_success());
        assert!(!Outcome::Success(json!(5)).is_failure());

        let failure = Outcome::Failure(TaskFailure {
            kind: ErrorKind::UserCallableError,
            message: "boom".to_string(),
            trace: "boom".to_string(),
        });
        assert!(failure.is_failure());
        assert!(!failure.is_success());
    }

    #[test]
    fn test_progress_payload_conversions() {
        assert_eq!(
            ProgressPayload::from("Iteration 0"),
            ProgressPayload::Text("Iteration 0".to_string())
        );
        assert_eq!(ProgressPayload::from(42), ProgressPayload::Counter(42));
    }

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            sequence: 3,
            payload: ProgressPayload::Text("Iteration 3".to_string()),
            emitted_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let round_tripped: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped, event);
    }
}
