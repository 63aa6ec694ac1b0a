//! Configuration defaults, environment parsing, and logging setup.

use dispatch_core::{DispatchError, DispatcherConfig};

#[test]
fn test_logging_initialization_is_idempotent() {
    dispatch_core::logging::init_structured_logging();
    dispatch_core::logging::init_structured_logging();
}

#[test]
fn test_default_configuration() {
    let config = DispatcherConfig::default();
    assert!(config.worker_threads > 0);
    assert!(config.default_timeout_ms.is_none());
    assert!(!config.single_admission);
}

#[test]
fn test_from_env_overrides_and_rejects_invalid_values() {
    // One test body for all DISPATCH_* variables; integration tests run in
    // parallel and must not race on shared process environment.
    std::env::set_var("DISPATCH_WORKER_THREADS", "2");
    std::env::set_var("DISPATCH_DEFAULT_TIMEOUT_MS", "1500");
    std::env::set_var("DISPATCH_SINGLE_ADMISSION", "true");

    let config = DispatcherConfig::from_env().unwrap();
    assert_eq!(config.worker_threads, 2);
    assert_eq!(config.default_timeout_ms, Some(1500));
    assert!(config.single_admission);

    std::env::set_var("DISPATCH_WORKER_THREADS", "not-a-number");
    let err = DispatcherConfig::from_env().unwrap_err();
    assert!(matches!(err, DispatchError::ConfigurationError(_)));

    std::env::set_var("DISPATCH_WORKER_THREADS", "0");
    let err = DispatcherConfig::from_env().unwrap_err();
    assert!(matches!(err, DispatchError::ConfigurationError(_)));

    std::env::remove_var("DISPATCH_WORKER_THREADS");
    std::env::remove_var("DISPATCH_DEFAULT_TIMEOUT_MS");
    std::env::remove_var("DISPATCH_SINGLE_ADMISSION");
}
