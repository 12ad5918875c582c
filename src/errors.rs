//! Typed error hierarchy for the declaration lifecycle core.
//!
//! Three top-level enums cover the three subsystems:
//! - `RequestError` — network/application failures from the query executor
//! - `OutboxError` — outbox registry and manual-retry failures
//! - `PersistError` — local key-value storage failures

use thiserror::Error;

/// Errors from the query/mutation executor boundary.
///
/// The download queue and outbox only need one distinction: network-class
/// failures (connectivity, timeout) versus everything else. `is_network`
/// encodes that split so state transitions can pick `FailedNetwork` vs
/// `Failed` without matching every variant.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Network failure: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Application error: {message}")]
    Application { message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RequestError {
    /// Whether this failure is network-class (connectivity or timeout).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Errors from the submission outbox registry.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("No failed mutation recorded for event {event_id} action {action}")]
    NoFailedMutation { event_id: String, action: String },
}

/// Errors from the local persistence adapter.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to read key '{key}': {source}")]
    ReadFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write key '{key}': {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt stored blob for key '{key}': {source}")]
    CorruptBlob {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize collection: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
