//! End-to-end scenarios through the public API: drafts persisted across
//! restarts, the download queue drained over the intent channel, manual
//! retry after exhausted attempts, and outbox/workqueue reconciliation.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vitalsync::persist::{USER_DATA_KEY, USER_DETAILS_KEY};
use vitalsync::reconcile::filter_processing_bucket;
use vitalsync::{
    DataTransformer, Declaration, DeclarationData, DownloadAction, DownloadStatus, DownloadedPayload,
    EventType, FileStore, Intent, LocalStore, MemoryStore, MutationAction, Operation, OutboxTracker,
    QueryExecutor, RequestError, ResultBucket, SearchRow, SubmissionStatus, SyncConfig, SyncRuntime,
    WorkqueueTab, derive_outbox, filter_processing,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Executor scripted with one result per call; records the operation names
/// it saw, in order.
struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<Value, RequestError>>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    fn new(script: Vec<Result<Value, RequestError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = variables
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        self.seen
            .lock()
            .unwrap()
            .push(format!("{}:{}", operation.name, id));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

/// Transformer that copies every top-level object in the response into a
/// section of the local data shape.
struct SectionTransformer;

impl DataTransformer for SectionTransformer {
    fn transform(
        &self,
        _event: EventType,
        _action: DownloadAction,
        response: &Value,
    ) -> Result<DownloadedPayload, RequestError> {
        let mut data = DeclarationData::default();
        if let Some(object) = response.as_object() {
            for (section, fields) in object {
                if let Some(fields) = fields.as_object() {
                    data.insert(section.clone(), fields.clone());
                }
            }
        }
        Ok(DownloadedPayload {
            data,
            registration_status: None,
            tracking_id: None,
            registration_number: None,
        })
    }
}

fn runtime_with(
    script: Vec<Result<Value, RequestError>>,
    storage: Arc<dyn LocalStore>,
) -> (SyncRuntime, Arc<ScriptedExecutor>) {
    let executor = Arc::new(ScriptedExecutor::new(script));
    let runtime = SyncRuntime::new(
        SyncConfig::default(),
        executor.clone(),
        Arc::new(SectionTransformer),
        storage,
    );
    (runtime, executor)
}

fn placeholder(id: &str) -> Declaration {
    Declaration::ready_to_download(EventType::Birth, id, DownloadAction::LoadReview)
}

#[tokio::test]
async fn drafts_survive_a_restart_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStore::new(dir.path()));
    storage
        .set_item(USER_DETAILS_KEY, r#"{"userMgntUserID":"u-1"}"#)
        .await
        .unwrap();

    // first session: load (empty), store a draft, write it out
    let (mut runtime, _executor) = runtime_with(Vec::new(), storage.clone());
    runtime.dispatch(Intent::SetInitial).await;
    let draft = Declaration::new_draft(EventType::Birth, None);
    let draft_id = draft.id.clone();
    let handle = runtime.handle();
    assert!(handle.send(Intent::Store(draft)));
    assert!(handle.send(Intent::Write));
    runtime.process_available().await;

    // second session against the same storage restores the draft
    let (mut restarted, _executor) = runtime_with(Vec::new(), storage);
    restarted.dispatch(Intent::SetInitial).await;
    let state = restarted.state();
    assert!(state.initial_loaded);
    assert_eq!(state.user_id, "u-1");
    assert_eq!(state.declarations.len(), 1);
    assert_eq!(state.declarations[0].id, draft_id);
}

#[tokio::test]
async fn downloads_drain_sequentially_in_enqueue_order() {
    init_tracing();
    let storage = Arc::new(MemoryStore::new());
    let (mut runtime, executor) = runtime_with(
        vec![
            Ok(json!({"child": {"n": 1}})),
            Ok(json!({"child": {"n": 2}})),
            Ok(json!({"child": {"n": 3}})),
        ],
        storage,
    );

    let handle = runtime.handle();
    for id in ["a", "b", "c"] {
        handle.send(Intent::EnqueueDownload(placeholder(id)));
    }
    runtime.process_available().await;

    let snapshot = runtime.snapshot();
    assert_eq!(executor.call_count(), 3);
    assert_eq!(runtime.state().downloading_count(), 0);
    for decl in &snapshot {
        assert_eq!(decl.download_status, Some(DownloadStatus::Downloaded));
    }
    let seen = executor.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "fetchBirthRegistrationForReview:a",
            "fetchBirthRegistrationForReview:b",
            "fetchBirthRegistrationForReview:c",
        ]
    );
}

#[tokio::test]
async fn exhausted_downloads_can_be_retried_manually() {
    init_tracing();
    let storage = Arc::new(MemoryStore::new());
    let (mut runtime, executor) = runtime_with(
        vec![
            Err(RequestError::Network("offline".into())),
            Err(RequestError::Timeout(std::time::Duration::from_secs(30))),
            Err(RequestError::Network("offline".into())),
            Ok(json!({"child": {"n": 1}})),
        ],
        storage.clone(),
    );

    runtime
        .dispatch(Intent::EnqueueDownload(placeholder("a")))
        .await;

    let snapshot = runtime.snapshot();
    assert_eq!(executor.call_count(), 3);
    assert_eq!(
        snapshot[0].download_status,
        Some(DownloadStatus::FailedNetwork)
    );
    assert_eq!(snapshot[0].download_retry_attempt, 3);
    let persisted = storage.get_item(USER_DATA_KEY).await.unwrap().unwrap();
    assert!(persisted.contains("failed_network"));

    // user presses retry: connectivity is back, attempt history preserved
    runtime
        .dispatch(Intent::EnqueueDownload(placeholder("a")))
        .await;
    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].download_status, Some(DownloadStatus::Downloaded));
    assert_eq!(snapshot[0].download_retry_attempt, 3);
    assert_eq!(executor.call_count(), 4);
}

#[tokio::test]
async fn in_flight_declarations_do_not_double_count_in_workqueues() {
    // two declarations are mid-registration locally
    let mut local = Vec::new();
    for id in ["r-1", "r-2"] {
        let mut decl = Declaration::new_draft(EventType::Birth, None);
        decl.id = id.into();
        decl.submission_status = SubmissionStatus::Registering;
        local.push(decl);
    }

    let row = |id: &str| SearchRow {
        id: id.into(),
        fields: serde_json::Map::new(),
    };
    let mut buckets = HashMap::new();
    buckets.insert(
        WorkqueueTab::ReadyForReview,
        ResultBucket {
            results: vec![row("r-1"), row("r-2"), row("r-3")],
            total_items: 10,
        },
    );
    buckets.insert(
        WorkqueueTab::ReadyToPrint,
        ResultBucket {
            results: vec![row("p-1")],
            total_items: 4,
        },
    );

    let filtered = filter_processing(buckets, &local);
    let review = &filtered[&WorkqueueTab::ReadyForReview];
    assert_eq!(review.results.len(), 1);
    assert_eq!(review.total_items, 8);
    assert_eq!(filtered[&WorkqueueTab::ReadyToPrint].total_items, 4);
}

#[tokio::test]
async fn outbox_overlays_pending_edits_and_supports_retry() {
    let mut tracker = OutboxTracker::new();
    let overlay: serde_json::Map<String, Value> =
        json!({"informantName": "Kofi"}).as_object().unwrap().clone();
    tracker.track("ev-1", MutationAction::Register, Some(overlay.clone()));

    let mut cache = HashMap::new();
    cache.insert(
        "ev-1".to_string(),
        json!({"informantName": "K.", "district": "Accra"})
            .as_object()
            .unwrap()
            .clone(),
    );

    let outbox = derive_outbox(&tracker, &cache);
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].declaration["informantName"], json!("Kofi"));
    assert_eq!(outbox[0].declaration["district"], json!("Accra"));

    // the mutation fails; the retry affordance hands back the original
    // payload and clears the failure
    tracker.mark_failed("ev-1", MutationAction::Register, "offline", true);
    let record = tracker.retry("ev-1", MutationAction::Register).unwrap();
    assert_eq!(record.declaration, Some(overlay));

    // retry with no matching failure is the one path that errors
    assert!(tracker.retry("ev-1", MutationAction::Certify).is_err());

    // confirmation removes it from the outbox entirely
    tracker.resolve("ev-1", MutationAction::Register);
    assert!(derive_outbox(&tracker, &cache).is_empty());
}

#[tokio::test]
async fn reconciliation_uses_the_processing_subset_only() {
    let processing: HashSet<_> = HashSet::new();
    let bucket = ResultBucket {
        results: Vec::new(),
        total_items: 7,
    };
    // an empty page still keeps its total for pagination continuity
    let filtered = filter_processing_bucket(bucket, &processing);
    assert_eq!(filtered.total_items, 7);

    // a draft sitting locally never filters server rows
    let mut draft = Declaration::new_draft(EventType::Death, None);
    draft.id = "d-1".into();
    let mut buckets = HashMap::new();
    buckets.insert(
        WorkqueueTab::InProgress,
        ResultBucket {
            results: vec![SearchRow {
                id: "d-1".into(),
                fields: serde_json::Map::new(),
            }],
            total_items: 1,
        },
    );
    let filtered = filter_processing(buckets, &[draft]);
    assert_eq!(filtered[&WorkqueueTab::InProgress].results.len(), 1);

    // once it is mid-submission it disappears from the same bucket
    let mut submitting = Declaration::new_draft(EventType::Death, None);
    submitting.id = "d-1".into();
    submitting.submission_status = SubmissionStatus::Submitting;
    let mut buckets = HashMap::new();
    buckets.insert(
        WorkqueueTab::InProgress,
        ResultBucket {
            results: vec![SearchRow {
                id: "d-1".into(),
                fields: serde_json::Map::new(),
            }],
            total_items: 1,
        },
    );
    let filtered = filter_processing(buckets, &[submitting]);
    assert!(filtered[&WorkqueueTab::InProgress].results.is_empty());
    assert_eq!(filtered[&WorkqueueTab::InProgress].total_items, 0);
}
