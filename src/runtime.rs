//! Effect runner.
//!
//! `SyncRuntime` is the single logical owner of the store state: intents
//! arrive over an mpsc channel (or through `dispatch` directly), each one
//! is reduced synchronously, and the returned effects are interpreted here
//! — fetches through the query executor, persistence through the local
//! store. Follow-up intents produced by an effect (download succeeded,
//! download failed, persist done) are processed before the next external
//! intent, which is what serializes the download queue end to end.
//!
//! External readers get cloned snapshots, never references into the owned
//! state.

use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::declaration::Declaration;
use crate::errors::RequestError;
use crate::outbox::OutboxTracker;
use crate::persist::{LocalStore, current_user_id, load_user_declarations, write_user_declarations};
use crate::store::{Effect, Intent, StoreState, reduce};
use crate::transport::{DataTransformer, FetchRequest, QueryExecutor, operation_for};

/// Cloneable handle for submitting intents to a running runtime.
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: mpsc::UnboundedSender<Intent>,
}

impl IntentSender {
    /// Submit an intent. Returns false if the runtime has shut down.
    pub fn send(&self, intent: Intent) -> bool {
        self.tx.send(intent).is_ok()
    }
}

/// The dispatch loop: owns the store state and the collaborator seams.
pub struct SyncRuntime {
    state: StoreState,
    config: SyncConfig,
    executor: Arc<dyn QueryExecutor>,
    transformer: Arc<dyn DataTransformer>,
    storage: Arc<dyn LocalStore>,
    outbox: OutboxTracker,
    tx: mpsc::UnboundedSender<Intent>,
    rx: mpsc::UnboundedReceiver<Intent>,
}

impl SyncRuntime {
    pub fn new(
        config: SyncConfig,
        executor: Arc<dyn QueryExecutor>,
        transformer: Arc<dyn DataTransformer>,
        storage: Arc<dyn LocalStore>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: StoreState::new(),
            config,
            executor,
            transformer,
            storage,
            outbox: OutboxTracker::new(),
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> IntentSender {
        IntentSender {
            tx: self.tx.clone(),
        }
    }

    /// Immutable snapshot of the current declarations.
    pub fn snapshot(&self) -> Vec<Declaration> {
        self.state.declarations.clone()
    }

    pub fn state(&self) -> StoreState {
        self.state.clone()
    }

    pub fn outbox(&self) -> &OutboxTracker {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut OutboxTracker {
        &mut self.outbox
    }

    /// Apply one intent and run its effects to quiescence: follow-up
    /// intents produced by the effects are drained before returning.
    pub async fn dispatch(&mut self, intent: Intent) {
        let mut pending = VecDeque::new();
        pending.push_back(intent);

        while let Some(intent) = pending.pop_front() {
            let effects = reduce(&mut self.state, intent, &self.config);
            for effect in effects {
                match effect {
                    Effect::Fetch(request) => {
                        let follow_up = self.perform_fetch(request).await;
                        pending.push_back(follow_up);
                    }
                    Effect::Persist => {
                        pending.push_back(self.perform_persist().await);
                    }
                    Effect::LoadInitial => {
                        pending.push_back(self.perform_initial_load().await);
                    }
                }
            }
        }
    }

    /// Process every intent currently queued on the channel, then return.
    /// Useful for UI-driven tick loops and tests that want to observe the
    /// state between batches.
    pub async fn process_available(&mut self) {
        while let Ok(intent) = self.rx.try_recv() {
            self.dispatch(intent).await;
        }
    }

    /// Run forever, serving intents from the channel. Intended to be
    /// spawned as the application's sync task.
    pub async fn run(mut self) {
        while let Some(intent) = self.rx.recv().await {
            self.dispatch(intent).await;
        }
        tracing::debug!("intent channel closed; sync runtime stopping");
    }

    async fn perform_fetch(&self, request: FetchRequest) -> Intent {
        let operation = operation_for(request.event, request.action);
        let variables = json!({ "id": request.id.as_str() });

        let fut = self.executor.execute(&operation, variables);
        let raw = match self.config.request_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(RequestError::Timeout(timeout)),
            },
            None => fut.await,
        };

        let transformed = raw.and_then(|response| {
            self.transformer
                .transform(request.event, request.action, &response)
        });

        match transformed {
            Ok(payload) => Intent::DownloadSucceeded {
                id: request.id,
                payload,
            },
            Err(err) => {
                tracing::debug!(id = %request.id, operation = operation.name, error = %err, "fetch failed");
                Intent::DownloadFailed {
                    id: request.id,
                    network: err.is_network(),
                    message: err.to_string(),
                }
            }
        }
    }

    async fn perform_persist(&self) -> Intent {
        let result = write_user_declarations(
            self.storage.as_ref(),
            &self.state.user_id,
            &self.state.declarations,
        )
        .await;
        match result {
            Ok(()) => Intent::PersistDone,
            Err(err) => Intent::PersistFailed {
                message: err.to_string(),
            },
        }
    }

    async fn perform_initial_load(&self) -> Intent {
        let user_id = match current_user_id(self.storage.as_ref()).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "could not resolve current user");
                return Intent::InitialLoadFailed;
            }
        };
        match load_user_declarations(self.storage.as_ref(), &user_id).await {
            Ok(declarations) => Intent::InitialLoaded {
                user_id,
                declarations,
            },
            Err(err) => {
                tracing::warn!(error = %err, "initial collection load failed");
                Intent::InitialLoadFailed
            }
        }
    }
}
