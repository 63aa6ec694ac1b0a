//! Progress emission from inside a running callable.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::delivery::{Delivery, DeliveryEvent};
use crate::outcome::{ProgressEvent, ProgressPayload};
use crate::task::TaskId;

/// Handed by reference to the callable so it can report intermediate
/// progress and observe cooperative cancellation.
///
/// Sequence numbers are assigned here, one counter per task, so progress
/// events observed by the delivery side are strictly increasing.
pub struct ProgressReporter {
    task_id: TaskId,
    tx: mpsc::UnboundedSender<Delivery>,
    sequence: AtomicU64,
    cancelled: Arc<AtomicBool>,
}

impl ProgressReporter {
    pub(crate) fn new(
        task_id: TaskId,
        tx: mpsc::UnboundedSender<Delivery>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            task_id,
            tx,
            sequence: AtomicU64::new(0),
            cancelled,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Emit one progress notification.
    pub fn emit(&self, payload: impl Into<ProgressPayload>) {
        let event = ProgressEvent {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            payload: payload.into(),
            emitted_at: Utc::now(),
        };

        // The delivery side only disappears on shutdown; there is no one
        // left to notify, so a failed send is not an error.
        let _ = self.tx.send(Delivery {
            task_id: self.task_id,
            event: DeliveryEvent::Progress(event),
        });
    }

    /// Whether cancellation was requested through the task handle. Purely
    /// cooperative; the callable decides when to check and how to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
