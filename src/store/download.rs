//! Download/retry queue transitions.
//!
//! Downloads are strictly serialized: at most one declaration holds
//! `Downloading` at any instant. Everything else waits at
//! `ReadyToDownload` and is drained FIFO in collection order, one fetch
//! per completion. A failing fetch is retried with the same parameters up
//! to the configured ceiling, then parked terminally as `Failed` or
//! `FailedNetwork` depending on the error class.

use crate::config::SyncConfig;
use crate::declaration::{Declaration, DeclarationId, DownloadStatus};
use crate::store::{Effect, StoreState};
use crate::transport::{DownloadedPayload, FetchRequest};

fn fetch_request(declaration: &Declaration) -> Option<FetchRequest> {
    Some(FetchRequest {
        id: declaration.id.clone(),
        event: declaration.event,
        action: declaration.action?,
    })
}

/// Locate the single in-flight download, asserting the invariant instead
/// of trusting positional lookup.
fn downloading_entry<'a>(state: &'a mut StoreState, id: &DeclarationId) -> Option<&'a mut Declaration> {
    debug_assert!(
        state.downloading_count() <= 1,
        "more than one declaration mid-download"
    );
    let entry = state.get_mut(id)?;
    if entry.download_status == Some(DownloadStatus::Downloading) {
        Some(entry)
    } else {
        None
    }
}

/// Promote the first parked declaration to `Downloading` and return its
/// fetch, if any are waiting.
fn start_next(state: &mut StoreState) -> Option<Effect> {
    let next = state
        .declarations
        .iter_mut()
        .find(|d| d.download_status == Some(DownloadStatus::ReadyToDownload))?;
    next.download_status = Some(DownloadStatus::Downloading);
    fetch_request(next).map(Effect::Fetch)
}

pub(crate) fn enqueue(state: &mut StoreState, mut declaration: Declaration) -> Vec<Effect> {
    if declaration.action.is_none() {
        tracing::warn!(id = %declaration.id, "enqueue without an action; ignoring");
        return Vec::new();
    }

    let busy = state
        .declarations
        .iter()
        .any(|d| d.is_downloading() && d.id != declaration.id);

    if let Some(existing) = state.get_mut(&declaration.id) {
        if existing.is_downloading() {
            // already in flight, nothing to restart
            return Vec::new();
        }
        // manual retry of a failed entry keeps its attempt history
        declaration.download_retry_attempt = declaration
            .download_retry_attempt
            .max(existing.download_retry_attempt);
        declaration.download_status = Some(if busy {
            DownloadStatus::ReadyToDownload
        } else {
            DownloadStatus::Downloading
        });
        let effects = if busy {
            Vec::new()
        } else {
            fetch_request(&declaration).map(Effect::Fetch).into_iter().collect()
        };
        *existing = declaration;
        return effects;
    }

    declaration.download_status = Some(if busy {
        DownloadStatus::ReadyToDownload
    } else {
        DownloadStatus::Downloading
    });
    let effects = if busy {
        Vec::new()
    } else {
        fetch_request(&declaration).map(Effect::Fetch).into_iter().collect()
    };
    state.declarations.push(declaration);
    effects
}

pub(crate) fn succeed(
    state: &mut StoreState,
    id: &DeclarationId,
    payload: DownloadedPayload,
) -> Vec<Effect> {
    let Some(entry) = downloading_entry(state, id) else {
        tracing::warn!(%id, "download success for a declaration not mid-download; ignoring");
        return Vec::new();
    };

    entry.data = payload.data;
    entry.download_status = Some(DownloadStatus::Downloaded);
    if payload.registration_status.is_some() {
        entry.registration_status = payload.registration_status;
    }
    if payload.tracking_id.is_some() {
        entry.tracking_id = payload.tracking_id;
    }
    if payload.registration_number.is_some() {
        entry.registration_number = payload.registration_number;
    }
    tracing::debug!(%id, "download complete");

    // advance the queue before persisting so the next fetch and the write
    // go out as one batch of effects
    let mut effects: Vec<Effect> = start_next(state).into_iter().collect();
    effects.push(Effect::Persist);
    effects
}

pub(crate) fn fail(
    state: &mut StoreState,
    id: &DeclarationId,
    network: bool,
    message: &str,
    config: &SyncConfig,
) -> Vec<Effect> {
    let ceiling = config.max_download_attempts;
    let Some(entry) = downloading_entry(state, id) else {
        tracing::warn!(%id, "download failure for a declaration not mid-download; ignoring");
        return Vec::new();
    };

    entry.download_retry_attempt += 1;
    if entry.download_retry_attempt < ceiling {
        tracing::debug!(
            %id,
            attempt = entry.download_retry_attempt,
            %message,
            "download failed; retrying"
        );
        return fetch_request(entry).map(Effect::Fetch).into_iter().collect();
    }

    entry.download_status = Some(if network {
        DownloadStatus::FailedNetwork
    } else {
        DownloadStatus::Failed
    });
    tracing::warn!(
        %id,
        attempts = entry.download_retry_attempt,
        network,
        %message,
        "download failed terminally"
    );

    let mut effects: Vec<Effect> = start_next(state).into_iter().collect();
    effects.push(Effect::Persist);
    effects
}
