//! Submission outbox.
//!
//! The outbox is derived, not stored: a typed registry tracks every
//! mutation that has been optimistically applied locally but not yet
//! confirmed by the server, and the effective event state shown to the
//! user is computed by overlaying each pending record's partial
//! declaration on the locally cached authoritative base. Mutations enter
//! the registry only through [`OutboxTracker::track`] with explicit typed
//! fields; there is no structural inspection of arbitrary variable shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::OutboxError;

/// Action families that can appear in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    Declare,
    Validate,
    Register,
    Reject,
    Certify,
    Correct,
    Assign,
    Unassign,
}

impl MutationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declare => "declare",
            Self::Validate => "validate",
            Self::Register => "register",
            Self::Reject => "reject",
            Self::Certify => "certify",
            Self::Correct => "correct",
            Self::Assign => "assign",
            Self::Unassign => "unassign",
        }
    }
}

impl FromStr for MutationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declare" => Ok(Self::Declare),
            "validate" => Ok(Self::Validate),
            "register" => Ok(Self::Register),
            "reject" => Ok(Self::Reject),
            "certify" => Ok(Self::Certify),
            "correct" => Ok(Self::Correct),
            "assign" => Ok(Self::Assign),
            "unassign" => Ok(Self::Unassign),
            _ => Err(format!("Invalid mutation action: {}", s)),
        }
    }
}

/// Where a tracked mutation currently stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum MutationStatus {
    Pending,
    Failed { message: String, network: bool },
}

/// One tracked mutation: the event it targets, the action family, and the
/// partial declaration payload it carries (the optimistic edit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub event_id: String,
    pub action: MutationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<Map<String, Value>>,
    pub status: MutationStatus,
}

impl MutationRecord {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, MutationStatus::Failed { .. })
    }
}

/// An effective event state as currently believed: cached base overlaid
/// with not-yet-confirmed edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub event_id: String,
    pub action: MutationAction,
    pub declaration: Map<String, Value>,
    pub failed: bool,
}

/// Registry of in-flight and failed mutations, keyed by (event, action).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboxTracker {
    records: Vec<MutationRecord>,
}

impl OutboxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, event_id: &str, action: MutationAction) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.event_id == event_id && r.action == action)
    }

    /// Register a mutation the moment it is optimistically applied.
    /// Re-tracking the same (event, action) pair replaces the old record.
    pub fn track(
        &mut self,
        event_id: impl Into<String>,
        action: MutationAction,
        declaration: Option<Map<String, Value>>,
    ) {
        let record = MutationRecord {
            event_id: event_id.into(),
            action,
            declaration,
            status: MutationStatus::Pending,
        };
        match self.position(&record.event_id, action) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
    }

    /// Server confirmed the mutation: drop the record.
    pub fn resolve(&mut self, event_id: &str, action: MutationAction) {
        if let Some(index) = self.position(event_id, action) {
            self.records.remove(index);
        }
    }

    /// The mutation failed; keep its payload so the user can retry it
    /// verbatim.
    pub fn mark_failed(
        &mut self,
        event_id: &str,
        action: MutationAction,
        message: impl Into<String>,
        network: bool,
    ) {
        if let Some(index) = self.position(event_id, action) {
            self.records[index].status = MutationStatus::Failed {
                message: message.into(),
                network,
            };
        }
    }

    /// Manual retry: flip the failed record back to pending and hand the
    /// caller its original payload for re-invocation. The only outbox path
    /// that surfaces an error to the caller.
    pub fn retry(
        &mut self,
        event_id: &str,
        action: MutationAction,
    ) -> Result<MutationRecord, OutboxError> {
        let index = self
            .position(event_id, action)
            .filter(|&i| self.records[i].is_failed())
            .ok_or_else(|| OutboxError::NoFailedMutation {
                event_id: event_id.to_string(),
                action: action.as_str().to_string(),
            })?;
        self.records[index].status = MutationStatus::Pending;
        Ok(self.records[index].clone())
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Compute the derived outbox: every not-yet-successful mutation, overlaid
/// on its cached base event. Records whose base event is not cached are
/// omitted — there is nothing to merge the edit onto.
pub fn derive_outbox(
    tracker: &OutboxTracker,
    cache: &HashMap<String, Map<String, Value>>,
) -> Vec<OutboxEntry> {
    tracker
        .records()
        .iter()
        .filter_map(|record| {
            let base = cache.get(&record.event_id)?;
            let mut declaration = base.clone();
            if let Some(overlay) = &record.declaration {
                for (field, value) in overlay {
                    declaration.insert(field.clone(), value.clone());
                }
            }
            Some(OutboxEntry {
                event_id: record.event_id.clone(),
                action: record.action,
                declaration,
                failed: record.is_failed(),
            })
        })
        .collect()
}
