//! Single-admission guard.

use std::sync::atomic::{AtomicBool, Ordering};

/// Non-blocking single-holder latch limiting concurrent task execution to
/// one at a time.
///
/// Lifecycle is `try_acquire -> held -> release`. A submission that loses
/// the race is rejected with an observable
/// [`AdmissionDenied`](crate::DispatchError::AdmissionDenied), never queued
/// and never silently dropped.
#[derive(Debug, Default)]
pub struct AdmissionGuard {
    held: AtomicBool,
}

impl AdmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to take the guard. Returns immediately; never blocks the
    /// submitting context.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_contend_release_reacquire() {
        let guard = AdmissionGuard::new();
        assert!(!guard.is_held());

        // First acquisition wins, second is rejected immediately.
        assert!(guard.try_acquire());
        assert!(guard.is_held());
        assert!(!guard.try_acquire());

        guard.release();
        assert!(!guard.is_held());
        assert!(guard.try_acquire());
    }

    #[test]
    fn test_contention_across_threads() {
        use std::sync::Arc;

        let guard = Arc::new(AdmissionGuard::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || guard.try_acquire())
            })
            .collect();

        let acquired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(acquired, 1);
    }
}
