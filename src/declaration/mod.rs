//! Declaration data model.
//!
//! A declaration is a single life-event record (birth, death, marriage)
//! moving through the registration workflow. It exists locally as a draft,
//! as a download placeholder for a server-listed record, or as a fully
//! downloaded record ready for review/certification. Two orthogonal status
//! enums track its lifecycle: `SubmissionStatus` for pending mutations and
//! `DownloadStatus` for the fetch state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Section-id → field-id → value, shape defined externally by the form
/// configuration.
pub type DeclarationData = HashMap<String, serde_json::Map<String, Value>>;

/// Opaque stable identifier: a client-generated UUID for local drafts, the
/// server-assigned composition id once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarationId(String);

impl DeclarationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for a local-only draft.
    pub fn new_draft() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeclarationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Life-event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Birth,
    Death,
    Marriage,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Death => "death",
            Self::Marriage => "marriage",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birth" => Ok(Self::Birth),
            "death" => Ok(Self::Death),
            "marriage" => Ok(Self::Marriage),
            _ => Err(format!("Invalid event type: {}", s)),
        }
    }
}

/// Pending-mutation state machine.
///
/// Each action family moves along its own `ReadyToX → Xing → X` path; any
/// `Xing` state may branch to `Failed` or `FailedNetwork`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Draft,
    ReadyToSubmit,
    Submitting,
    Submitted,
    ReadyToApprove,
    Approving,
    Approved,
    ReadyToRegister,
    Registering,
    Registered,
    ReadyToReject,
    Rejecting,
    Rejected,
    ReadyToCertify,
    Certifying,
    Certified,
    Failed,
    FailedNetwork,
}

impl SubmissionStatus {
    /// The in-flight subset: declarations in these states have a pending,
    /// not-yet-confirmed mutation and are filtered out of server list
    /// results during reconciliation.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            Self::ReadyToSubmit
                | Self::Submitting
                | Self::ReadyToApprove
                | Self::Approving
                | Self::ReadyToRegister
                | Self::Registering
                | Self::ReadyToReject
                | Self::Rejecting
                | Self::ReadyToCertify
                | Self::Certifying
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::FailedNetwork)
    }

    /// Server-confirmed terminal state of an action family, if this is one.
    pub fn confirmed_registration_status(&self) -> Option<RegistrationStatus> {
        match self {
            Self::Submitted => Some(RegistrationStatus::Declared),
            Self::Approved => Some(RegistrationStatus::Validated),
            Self::Registered => Some(RegistrationStatus::Registered),
            Self::Rejected => Some(RegistrationStatus::Rejected),
            Self::Certified => Some(RegistrationStatus::Certified),
            _ => None,
        }
    }
}

/// Fetch state machine for full declaration data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    ReadyToDownload,
    Downloading,
    Downloaded,
    Failed,
    FailedNetwork,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Failed | Self::FailedNetwork)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::FailedNetwork)
    }
}

/// Last authoritative workflow status reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Declared,
    Validated,
    Registered,
    Rejected,
    Certified,
}

/// Which query shape to issue when downloading full data, keyed by what the
/// user intends to do with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadAction {
    LoadReview,
    LoadCertificate,
    LoadCorrection,
}

impl DownloadAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadReview => "load_review",
            Self::LoadCertificate => "load_certificate",
            Self::LoadCorrection => "load_correction",
        }
    }
}

/// A single life-event record tracked by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclarationId,
    pub event: EventType,
    #[serde(default)]
    pub data: DeclarationData,
    #[serde(default)]
    pub submission_status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_status: Option<DownloadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<RegistrationStatus>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub saved_on: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub download_retry_attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<DownloadAction>,
}

impl Declaration {
    /// Fresh local draft.
    pub fn new_draft(event: EventType, data: Option<DeclarationData>) -> Self {
        Self {
            id: DeclarationId::new_draft(),
            event,
            data: data.unwrap_or_default(),
            submission_status: SubmissionStatus::Draft,
            download_status: None,
            registration_status: None,
            saved_on: Some(Utc::now()),
            modified_on: None,
            tracking_id: None,
            composition_id: None,
            registration_number: None,
            download_retry_attempt: 0,
            action: None,
        }
    }

    /// Download placeholder for a server-listed record the user chose to
    /// act on. Full data arrives once the queue fetches it.
    pub fn ready_to_download(
        event: EventType,
        composition_id: impl Into<String>,
        action: DownloadAction,
    ) -> Self {
        let composition_id = composition_id.into();
        Self {
            id: DeclarationId::new(composition_id.clone()),
            event,
            data: DeclarationData::default(),
            submission_status: SubmissionStatus::Draft,
            download_status: Some(DownloadStatus::ReadyToDownload),
            registration_status: None,
            saved_on: None,
            modified_on: None,
            tracking_id: None,
            composition_id: Some(composition_id),
            registration_number: None,
            download_retry_attempt: 0,
            action: Some(action),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.submission_status.is_processing()
    }

    pub fn is_downloading(&self) -> bool {
        self.download_status == Some(DownloadStatus::Downloading)
    }
}
