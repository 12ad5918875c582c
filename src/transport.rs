//! Collaborator interfaces for network fetches and payload shaping.
//!
//! The core never speaks GraphQL itself. It resolves a closed
//! (event, action) → operation mapping, hands the operation to a
//! caller-supplied [`QueryExecutor`], and runs the raw response through a
//! caller-supplied [`DataTransformer`] keyed by the same pair. Both traits
//! are object-safe so the runtime can hold them as `Arc<dyn _>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::declaration::{
    DeclarationData, DeclarationId, DownloadAction, EventType, RegistrationStatus,
};
use crate::errors::RequestError;

/// A named server operation and the response key its payload lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub data_key: &'static str,
}

/// Closed mapping from (event, download action) to the operation to issue.
///
/// Exhaustive by construction: adding an event type or action fails to
/// compile until every pairing is decided.
pub fn operation_for(event: EventType, action: DownloadAction) -> Operation {
    match (event, action) {
        (EventType::Birth, DownloadAction::LoadReview | DownloadAction::LoadCorrection) => {
            Operation {
                name: "fetchBirthRegistrationForReview",
                data_key: "fetchBirthRegistration",
            }
        }
        (EventType::Birth, DownloadAction::LoadCertificate) => Operation {
            name: "fetchBirthRegistrationForCertificate",
            data_key: "fetchBirthRegistration",
        },
        (EventType::Death, DownloadAction::LoadReview | DownloadAction::LoadCorrection) => {
            Operation {
                name: "fetchDeathRegistrationForReview",
                data_key: "fetchDeathRegistration",
            }
        }
        (EventType::Death, DownloadAction::LoadCertificate) => Operation {
            name: "fetchDeathRegistrationForCertificate",
            data_key: "fetchDeathRegistration",
        },
        (EventType::Marriage, DownloadAction::LoadReview | DownloadAction::LoadCorrection) => {
            Operation {
                name: "fetchMarriageRegistrationForReview",
                data_key: "fetchMarriageRegistration",
            }
        }
        (EventType::Marriage, DownloadAction::LoadCertificate) => Operation {
            name: "fetchMarriageRegistrationForCertificate",
            data_key: "fetchMarriageRegistration",
        },
    }
}

/// Everything the download queue needs to issue (or re-issue) one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: DeclarationId,
    pub event: EventType,
    pub action: DownloadAction,
}

/// Transformed server payload ready to land in the local store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadedPayload {
    pub data: DeclarationData,
    pub registration_status: Option<RegistrationStatus>,
    pub tracking_id: Option<String>,
    pub registration_number: Option<String>,
}

/// Query/mutation executor supplied by the transport layer.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a named operation. Implementations must classify failures:
    /// connectivity/timeout problems as [`RequestError::Network`] or
    /// [`RequestError::Timeout`], well-formed business-rule rejections as
    /// [`RequestError::Application`].
    async fn execute(&self, operation: &Operation, variables: Value)
    -> Result<Value, RequestError>;
}

/// Pure form-to-data transformer supplied by the form-configuration layer.
pub trait DataTransformer: Send + Sync {
    /// Shape a raw server response into the local declaration data model.
    /// The (event, action) pair tells the implementation which query shape
    /// it is looking at and which data key to read.
    fn transform(
        &self,
        event: EventType,
        action: DownloadAction,
        response: &Value,
    ) -> Result<DownloadedPayload, RequestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_and_correction_share_a_query_shape() {
        let review = operation_for(EventType::Birth, DownloadAction::LoadReview);
        let correction = operation_for(EventType::Birth, DownloadAction::LoadCorrection);
        assert_eq!(review, correction);
        assert_eq!(review.data_key, "fetchBirthRegistration");
    }

    #[test]
    fn certificate_queries_differ_per_event() {
        let birth = operation_for(EventType::Birth, DownloadAction::LoadCertificate);
        let death = operation_for(EventType::Death, DownloadAction::LoadCertificate);
        assert_ne!(birth.name, death.name);
        assert!(birth.name.contains("Certificate"));
    }
}
