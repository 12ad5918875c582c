//! Workqueue reconciliation.
//!
//! Server work queues are paginated; declarations the client already shows
//! as in flight (outbox, pending submission) must not be double-counted
//! when a page of results arrives. Filtering removes matching rows and
//! decrements `total_items` by exactly the number removed — never
//! recomputed from the filtered length, so pagination stays correct for
//! rows on other pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::declaration::{Declaration, DeclarationId};

/// Named workflow tabs, one server result bucket each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkqueueTab {
    InProgress,
    ReadyForReview,
    RequiresUpdate,
    SentForApproval,
    ExternalValidation,
    ReadyToPrint,
}

impl WorkqueueTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::ReadyForReview => "ready_for_review",
            Self::RequiresUpdate => "requires_update",
            Self::SentForApproval => "sent_for_approval",
            Self::ExternalValidation => "external_validation",
            Self::ReadyToPrint => "ready_to_print",
        }
    }
}

impl FromStr for WorkqueueTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "ready_for_review" => Ok(Self::ReadyForReview),
            "requires_update" => Ok(Self::RequiresUpdate),
            "sent_for_approval" => Ok(Self::SentForApproval),
            "external_validation" => Ok(Self::ExternalValidation),
            "ready_to_print" => Ok(Self::ReadyToPrint),
            _ => Err(format!("Invalid workqueue tab: {}", s)),
        }
    }
}

/// One row of a server result page. Only the id matters for
/// reconciliation; the rest of the row rides along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRow {
    pub id: DeclarationId,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

/// A paginated server result set for one tab.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultBucket {
    pub results: Vec<SearchRow>,
    pub total_items: u64,
}

/// Filter one bucket against the set of locally processing ids.
pub fn filter_processing_bucket(
    mut bucket: ResultBucket,
    processing: &HashSet<&DeclarationId>,
) -> ResultBucket {
    let before = bucket.results.len();
    bucket.results.retain(|row| !processing.contains(&row.id));
    let removed = (before - bucket.results.len()) as u64;
    bucket.total_items = bucket.total_items.saturating_sub(removed);
    bucket
}

/// Filter every named bucket at once against the local declaration list.
pub fn filter_processing(
    buckets: HashMap<WorkqueueTab, ResultBucket>,
    local: &[Declaration],
) -> HashMap<WorkqueueTab, ResultBucket> {
    let processing: HashSet<&DeclarationId> = local
        .iter()
        .filter(|d| d.is_processing())
        .map(|d| &d.id)
        .collect();
    buckets
        .into_iter()
        .map(|(tab, bucket)| (tab, filter_processing_bucket(bucket, &processing)))
        .collect()
}
