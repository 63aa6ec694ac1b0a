use std::time::Duration;

use crate::error::{DispatchError, Result};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Background worker pool size.
    pub worker_threads: usize,

    /// Default per-task time budget in milliseconds. `None` disables the
    /// timeout; tasks may override either way with `Task::with_timeout`.
    pub default_timeout_ms: Option<u64>,

    /// Carry an admission guard so at most one task runs at a time.
    pub single_admission: bool,

    /// In-flight registry size above which a warning is logged.
    pub registry_capacity_warning: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            default_timeout_ms: None,
            single_admission: false,
            registry_capacity_warning: 1024,
        }
    }
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(threads) = std::env::var("DISPATCH_WORKER_THREADS") {
            config.worker_threads = threads.parse().map_err(|e| {
                DispatchError::ConfigurationError(format!("Invalid worker_threads: {e}"))
            })?;
            if config.worker_threads == 0 {
                return Err(DispatchError::ConfigurationError(
                    "worker_threads must be greater than 0".to_string(),
                ));
            }
        }

        if let Ok(timeout) = std::env::var("DISPATCH_DEFAULT_TIMEOUT_MS") {
            config.default_timeout_ms = Some(timeout.parse().map_err(|e| {
                DispatchError::ConfigurationError(format!("Invalid default_timeout_ms: {e}"))
            })?);
        }

        if let Ok(single) = std::env::var("DISPATCH_SINGLE_ADMISSION") {
            config.single_admission = single.parse().map_err(|e| {
                DispatchError::ConfigurationError(format!("Invalid single_admission: {e}"))
            })?;
        }

        Ok(config)
    }

    pub(crate) fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert!(config.worker_threads > 0);
        assert!(config.default_timeout_ms.is_none());
        assert!(!config.single_admission);
        assert_eq!(config.registry_capacity_warning, 1024);
    }

    #[test]
    fn test_default_timeout_conversion() {
        let config = DispatcherConfig {
            default_timeout_ms: Some(250),
            ..DispatcherConfig::default()
        };
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(250)));
    }
}
