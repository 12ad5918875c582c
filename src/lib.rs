//! Offline-first declaration lifecycle core for a civil registration
//! (CRVS) client.
//!
//! Tracks life-event declarations from local draft through submission,
//! server-side action processing, and local synchronization: a strictly
//! serialized download/retry queue, a derived submission outbox with
//! optimistic overlays, workqueue reconciliation against paginated server
//! results, and a per-user persisted collection. Rendering, the GraphQL
//! schema, form configuration, and auth are collaborators consumed through
//! the traits in [`transport`] and [`persist`].

pub mod config;
pub mod declaration;
pub mod errors;
pub mod outbox;
pub mod persist;
pub mod reconcile;
pub mod runtime;
pub mod store;
pub mod transport;

pub use config::SyncConfig;
pub use declaration::{
    Declaration, DeclarationData, DeclarationId, DownloadAction, DownloadStatus, EventType,
    RegistrationStatus, SubmissionStatus,
};
pub use errors::{OutboxError, PersistError, RequestError};
pub use outbox::{MutationAction, MutationRecord, OutboxEntry, OutboxTracker, derive_outbox};
pub use persist::{FileStore, LocalStore, MemoryStore};
pub use reconcile::{ResultBucket, SearchRow, WorkqueueTab, filter_processing};
pub use runtime::{IntentSender, SyncRuntime};
pub use store::{Effect, Intent, StoreState, reduce};
pub use transport::{
    DataTransformer, DownloadedPayload, FetchRequest, Operation, QueryExecutor, operation_for,
};
