//! Structured error handling for the dispatch core.

use thiserror::Error;

use crate::outcome::ErrorKind;

/// Errors surfaced synchronously by the dispatcher.
///
/// Failures that occur while a task is already running are never returned
/// through this type; they are converted to an [`Outcome`](crate::Outcome)
/// and delivered through the registered callbacks instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The admission guard is configured and currently held by another
    /// in-flight task. The submission is rejected, not queued.
    #[error("Admission denied: guard is held by another in-flight task")]
    AdmissionDenied,

    /// The background execution context could not be created or acquired.
    #[error("Execution context unavailable: {reason}")]
    ExecutionContextUnavailable { reason: String },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl DispatchError {
    /// The outcome-level [`ErrorKind`] this error maps to, for callers that
    /// funnel synchronous rejections into the same display path as
    /// asynchronous failures.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            DispatchError::AdmissionDenied => ErrorKind::AdmissionDenied,
            DispatchError::ExecutionContextUnavailable { .. }
            | DispatchError::ConfigurationError(_) => ErrorKind::ExecutionContextUnavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            DispatchError::AdmissionDenied.error_kind(),
            ErrorKind::AdmissionDenied
        );
        assert_eq!(
            DispatchError::ExecutionContextUnavailable {
                reason: "pool exhausted".to_string()
            }
            .error_kind(),
            ErrorKind::ExecutionContextUnavailable
        );
    }

    #[test]
    fn test_error_display() {
        let err = DispatchError::ExecutionContextUnavailable {
            reason: "pool exhausted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Execution context unavailable: pool exhausted"
        );
    }
}
