use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigLoadError;

/// Scanner controller tuning. Durations are in milliseconds so the file
/// format stays plain numbers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Delay before the controller restarts scanning after a rejected
    /// approval.
    pub retry_delay_ms: u64,
    /// Consecutive unrecognized or rejected attempts tolerated before the
    /// controller forces a full restart of the camera and decoder.
    pub max_failed_attempts: u32,
    /// Pause after teardown on an explicit close, giving the camera time to
    /// release before the caller navigates away.
    pub close_grace_ms: u64,
    /// Identical unrecognized payloads inside this window are neither
    /// reported again nor counted as new attempts.
    pub error_debounce_ms: u64,
    /// Upper bound for each asynchronous teardown step.
    pub teardown_step_timeout_ms: u64,
    /// Destination used after a successful approval when neither the server
    /// nor the payload supplies one.
    pub default_redirect: String,
    /// Decoded frames buffered between the decoder and the controller.
    pub frame_buffer: usize,
    /// Identifier of the video surface the decoder renders into.
    pub surface_id: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 2_000,
            max_failed_attempts: 5,
            close_grace_ms: 150,
            error_debounce_ms: 3_000,
            teardown_step_timeout_ms: 2_000,
            default_redirect: "/".to_string(),
            frame_buffer: 16,
            surface_id: "qr-reader".to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn error_debounce(&self) -> Duration {
        Duration::from_millis(self.error_debounce_ms)
    }

    pub fn teardown_step_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_step_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_failed_attempts == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "scanner.max_failed_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.frame_buffer == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "scanner.frame_buffer".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.teardown_step_timeout_ms == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "scanner.teardown_step_timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
