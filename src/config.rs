//! Runtime configuration for the sync core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the download queue and effect runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum fetch attempts per declaration before it is marked failed
    pub max_download_attempts: u32,
    /// Optional per-request timeout in milliseconds; timeouts count as
    /// network-class failures
    pub request_timeout_ms: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_download_attempts: 3,
            request_timeout_ms: None,
        }
    }
}

impl SyncConfig {
    /// Set the retry ceiling for downloads.
    pub fn with_max_download_attempts(mut self, attempts: u32) -> Self {
        self.max_download_attempts = attempts;
        self
    }

    /// Set the per-request timeout in milliseconds.
    pub fn with_request_timeout_ms(mut self, millis: u64) -> Self {
        self.request_timeout_ms = Some(millis);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
