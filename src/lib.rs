#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatch Core
//!
//! Background-task dispatch and result-delivery core.
//!
//! ## Overview
//!
//! A [`TaskDispatcher`] accepts a unit of work (a callable plus its fixed
//! arguments), runs it on a bounded background worker pool, and delivers
//! exactly one terminal outcome (success-with-value or failure-with-error)
//! plus optional ordered progress notifications back to the owning control
//! context. An optional single-admission guard rejects overlapping runs
//! instead of queueing or silently dropping them.
//!
//! ## Architecture
//!
//! Notifications cross the worker/control boundary as plain data on an
//! explicit message-passing channel drained by the control context through a
//! [`DeliveryQueue`]; no callback ever runs on a background worker. Per
//! task, the delivery order is progress* -> terminal -> finished, with the
//! finished notification firing exactly once, after the terminal outcome,
//! regardless of how the callable ended.
//!
//! ## Module Organization
//!
//! - [`config`] - Dispatcher configuration
//! - [`delivery`] - Worker-to-control notification channel and callbacks
//! - [`dispatcher`] - Task submission and supervision
//! - [`error`] - Structured error handling
//! - [`guard`] - Single-admission guard
//! - [`logging`] - Structured logging setup
//! - [`outcome`] - Terminal outcomes and progress events
//! - [`progress`] - Progress emission from inside a callable
//! - [`task`] - Task definition and submission handles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dispatch_core::{DispatcherConfig, Task, TaskCallbacks, TaskDispatcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (dispatcher, mut delivery) = TaskDispatcher::new(DispatcherConfig::default());
//!
//! let task = Task::new("long_running_task", |progress| {
//!     for i in 0..3 {
//!         progress.emit(format!("Iteration {i}"));
//!     }
//!     Ok(serde_json::json!("Done."))
//! });
//!
//! let callbacks = TaskCallbacks::new()
//!     .on_progress(|event| println!("{:?}", event.payload))
//!     .on_success(|value| println!("result = {value}"))
//!     .on_failure(|failure| eprintln!("{}: {}", failure.message, failure.trace))
//!     .on_finished(|| println!("Task finished."));
//!
//! dispatcher.submit(task, callbacks)?;
//!
//! // The context draining the queue owns all callback state.
//! delivery.drain_until_finished(1).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod logging;
pub mod outcome;
pub mod progress;
pub mod task;

pub use config::DispatcherConfig;
pub use delivery::{DeliveredEvent, DeliveryQueue, TaskCallbacks};
pub use dispatcher::{DispatcherStats, TaskDispatcher};
pub use error::{DispatchError, Result};
pub use guard::AdmissionGuard;
pub use outcome::{ErrorKind, Outcome, ProgressEvent, ProgressPayload, TaskFailure};
pub use progress::ProgressReporter;
pub use task::{Callable, Task, TaskHandle, TaskId, TaskValue};
