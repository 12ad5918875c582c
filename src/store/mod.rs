//! Declaration store reducer.
//!
//! The collection of all known declarations is a single shared mutable
//! resource. Every mutation goes through [`reduce`], which applies the
//! intent synchronously and returns the side effects the runtime must
//! perform (fetches, persistence, initial load). Transitions themselves
//! never touch the network or disk, so they are unit-testable without a
//! runtime.

pub mod download;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::declaration::{Declaration, DeclarationId, DownloadStatus};
use crate::transport::{DownloadedPayload, FetchRequest};

/// In-memory state: the current user's declarations plus load bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub user_id: String,
    pub declarations: Vec<Declaration>,
    /// Set once the persisted collection has been loaded (or the load
    /// failed) so the UI never waits forever.
    pub initial_loaded: bool,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DeclarationId) -> Option<&Declaration> {
        self.declarations.iter().find(|d| &d.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &DeclarationId) -> Option<&mut Declaration> {
        self.declarations.iter_mut().find(|d| &d.id == id)
    }

    /// Number of declarations currently mid-download. The queue keeps this
    /// at zero or one.
    pub fn downloading_count(&self) -> usize {
        self.declarations
            .iter()
            .filter(|d| d.download_status == Some(DownloadStatus::Downloading))
            .count()
    }

    /// Ids of declarations with a pending in-flight mutation.
    pub fn processing_ids(&self) -> Vec<&DeclarationId> {
        self.declarations
            .iter()
            .filter(|d| d.is_processing())
            .map(|d| &d.id)
            .collect()
    }
}

/// A mutation request against the store.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Append a new declaration. The caller is responsible for not storing
    /// the same id twice.
    Store(Declaration),
    /// Replace the declaration with the matching id, stamping
    /// `modified_on`. No-op for unknown ids or when nothing changed.
    Modify(Declaration),
    /// Remove a declaration and persist the shrunken collection.
    Delete { id: DeclarationId },
    /// Persist the collection as it stands.
    Write,
    /// Load the current user's persisted collection.
    SetInitial,
    /// Initial load finished: replace user and collection wholesale.
    InitialLoaded {
        user_id: String,
        declarations: Vec<Declaration>,
    },
    /// Initial load failed or was empty; unblock the UI anyway.
    InitialLoadFailed,
    /// A persistence write finished.
    PersistDone,
    /// A persistence write failed; the in-memory collection stays
    /// authoritative for the session.
    PersistFailed { message: String },
    /// Queue a declaration for download.
    EnqueueDownload(Declaration),
    DownloadSucceeded {
        id: DeclarationId,
        payload: DownloadedPayload,
    },
    DownloadFailed {
        id: DeclarationId,
        network: bool,
        message: String,
    },
}

/// Side effects requested by a transition, interpreted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue (or re-issue) a download fetch.
    Fetch(FetchRequest),
    /// Serialize and write the current user's collection.
    Persist,
    /// Read the persisted collection for the current user.
    LoadInitial,
}

/// Apply one intent. Mutates `state` in place and returns the effects to
/// run, in order.
pub fn reduce(state: &mut StoreState, intent: Intent, config: &SyncConfig) -> Vec<Effect> {
    match intent {
        Intent::Store(declaration) => {
            state.declarations.push(declaration);
            Vec::new()
        }
        Intent::Modify(mut incoming) => {
            let Some(existing) = state.get_mut(&incoming.id) else {
                return Vec::new();
            };
            // navigation-triggered modifies can carry identical data;
            // skip the timestamp churn in that case
            incoming.modified_on = existing.modified_on;
            if *existing == incoming {
                return Vec::new();
            }
            incoming.modified_on = Some(Utc::now());
            *existing = incoming;
            Vec::new()
        }
        Intent::Delete { id } => {
            state.declarations.retain(|d| d.id != id);
            vec![Effect::Persist]
        }
        Intent::Write => vec![Effect::Persist],
        Intent::SetInitial => vec![Effect::LoadInitial],
        Intent::InitialLoaded {
            user_id,
            declarations,
        } => {
            state.user_id = user_id;
            state.declarations = declarations;
            state.initial_loaded = true;
            Vec::new()
        }
        Intent::InitialLoadFailed => {
            state.initial_loaded = true;
            Vec::new()
        }
        Intent::PersistDone => Vec::new(),
        Intent::PersistFailed { message } => {
            tracing::warn!(%message, "collection persist failed; session state stays authoritative");
            Vec::new()
        }
        Intent::EnqueueDownload(declaration) => download::enqueue(state, declaration),
        Intent::DownloadSucceeded { id, payload } => download::succeed(state, &id, payload),
        Intent::DownloadFailed {
            id,
            network,
            message,
        } => download::fail(state, &id, network, &message, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{EventType, SubmissionStatus};

    fn draft(event: EventType) -> Declaration {
        Declaration::new_draft(event, None)
    }

    #[test]
    fn store_appends() {
        let mut state = StoreState::new();
        let effects = reduce(
            &mut state,
            Intent::Store(draft(EventType::Birth)),
            &SyncConfig::default(),
        );
        assert!(effects.is_empty());
        assert_eq!(state.declarations.len(), 1);
    }

    #[test]
    fn modify_replaces_without_duplicating() {
        let mut state = StoreState::new();
        let decl = draft(EventType::Birth);
        let id = decl.id.clone();
        reduce(&mut state, Intent::Store(decl.clone()), &SyncConfig::default());

        let mut edited = decl;
        edited.submission_status = SubmissionStatus::ReadyToSubmit;
        reduce(&mut state, Intent::Modify(edited), &SyncConfig::default());

        assert_eq!(state.declarations.len(), 1);
        let stored = state.get(&id).unwrap();
        assert_eq!(stored.submission_status, SubmissionStatus::ReadyToSubmit);
        assert!(stored.modified_on.is_some());
    }

    #[test]
    fn modify_with_no_change_skips_timestamp() {
        let mut state = StoreState::new();
        let decl = draft(EventType::Death);
        reduce(&mut state, Intent::Store(decl.clone()), &SyncConfig::default());
        reduce(&mut state, Intent::Modify(decl.clone()), &SyncConfig::default());
        assert!(state.get(&decl.id).unwrap().modified_on.is_none());
    }

    #[test]
    fn modify_unknown_id_is_a_noop() {
        let mut state = StoreState::new();
        reduce(
            &mut state,
            Intent::Modify(draft(EventType::Birth)),
            &SyncConfig::default(),
        );
        assert!(state.declarations.is_empty());
    }

    #[test]
    fn delete_removes_and_persists() {
        let mut state = StoreState::new();
        let decl = draft(EventType::Birth);
        let id = decl.id.clone();
        reduce(&mut state, Intent::Store(decl), &SyncConfig::default());

        let effects = reduce(&mut state, Intent::Delete { id }, &SyncConfig::default());
        assert_eq!(effects, vec![Effect::Persist]);
        assert!(state.declarations.is_empty());
    }

    #[test]
    fn initial_load_replaces_wholesale_and_unblocks() {
        let mut state = StoreState::new();
        reduce(&mut state, Intent::Store(draft(EventType::Birth)), &SyncConfig::default());

        let restored = vec![draft(EventType::Death), draft(EventType::Marriage)];
        reduce(
            &mut state,
            Intent::InitialLoaded {
                user_id: "u-1".into(),
                declarations: restored,
            },
            &SyncConfig::default(),
        );
        assert_eq!(state.user_id, "u-1");
        assert_eq!(state.declarations.len(), 2);
        assert!(state.initial_loaded);
    }

    #[test]
    fn failed_initial_load_still_unblocks() {
        let mut state = StoreState::new();
        reduce(&mut state, Intent::InitialLoadFailed, &SyncConfig::default());
        assert!(state.initial_loaded);
    }

    #[test]
    fn set_initial_requests_a_load() {
        let mut state = StoreState::new();
        let effects = reduce(&mut state, Intent::SetInitial, &SyncConfig::default());
        assert_eq!(effects, vec![Effect::LoadInitial]);
    }
}
