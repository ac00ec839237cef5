//! End-to-end pipeline scenarios over the local adapters: filesystem
//! object store, in-process queue, SQLite repository, scripted speech
//! engine, deterministic embedder.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mediasearch::config::Settings;
use mediasearch::models::{derive_version_id, AssetStatus, PublishState, TriageState};
use mediasearch::ports::{
    AsrResult, AsrSegment, Embedder, JobQueue, MediaDatabase, ObjectEvent, ObjectEventKind,
    ObjectStore,
};
use mediasearch::queue::LocalJobQueue;
use mediasearch::repository::SqliteRepository;
use mediasearch::search::{SearchMode, SearchRequest, SearchService};
use mediasearch::storage::LocalObjectStore;
use mediasearch::{ErrorKind, PipelineError};
use mediasearch_engines::mock::{MockSpeechEngine, ScriptedResponse};
use mediasearch_engines::HashEmbedder;
use mediasearch_pipeline::{IngestController, Orchestrator, RetryManager, Worker};
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    settings: Settings,
    db: Arc<SqliteRepository>,
    store: Arc<LocalObjectStore>,
    queue: Arc<LocalJobQueue>,
    engine: Arc<MockSpeechEngine>,
    embedder: Arc<HashEmbedder>,
    ingest: IngestController,
}

impl Harness {
    fn new(script: Vec<ScriptedResponse>) -> Self {
        Self::with_settings(script, |_| {})
    }

    fn with_settings(
        script: Vec<ScriptedResponse>,
        tweak: impl FnOnce(&mut Settings),
    ) -> Self {
        let temp = TempDir::new().expect("temp dir");
        let mut settings = Settings::with_data_dir(temp.path().to_path_buf());
        settings.retry_base_delay = Duration::from_millis(10);
        settings.retry_max_delay = Duration::from_millis(50);
        settings.poll_interval = Duration::from_millis(20);
        tweak(&mut settings);
        settings.ensure_directories().expect("dirs");

        let db = Arc::new(SqliteRepository::open(settings.database_path()).expect("repo"));
        let store = Arc::new(LocalObjectStore::new(
            settings.buckets_dir(),
            settings.poll_interval,
        ));
        let queue = Arc::new(LocalJobQueue::new());
        let engine = Arc::new(MockSpeechEngine::with_script(script));
        let embedder = Arc::new(HashEmbedder::new(settings.embedding_dimension));

        let orchestrator = Arc::new(Orchestrator::new(
            db.clone() as Arc<dyn MediaDatabase>,
            store.clone(),
            engine.clone(),
            embedder.clone(),
            settings.clone(),
        ));
        let retry = Arc::new(RetryManager::new(
            db.clone() as Arc<dyn MediaDatabase>,
            queue.clone(),
            settings.clone(),
        ));
        let worker = Worker::new(
            db.clone() as Arc<dyn MediaDatabase>,
            queue.clone(),
            orchestrator,
            retry,
            settings.clone(),
        );
        tokio::spawn(async move {
            let _ = worker.run().await;
        });

        let ingest = IngestController::new(
            db.clone() as Arc<dyn MediaDatabase>,
            store.clone(),
            queue.clone(),
            settings.clone(),
        );

        Self {
            _temp: temp,
            settings,
            db,
            store,
            queue,
            engine,
            embedder,
            ingest,
        }
    }

    fn search_service(&self) -> SearchService {
        SearchService::new(
            self.db.clone() as Arc<dyn MediaDatabase>,
            self.embedder.clone() as Arc<dyn Embedder>,
            self.settings.hybrid_keyword_weight,
            self.settings.hybrid_semantic_weight,
        )
    }

    async fn upload_and_notify(
        &self,
        key: &str,
        content: &[u8],
        etag: &str,
        mtime_ms: i64,
    ) -> Result<(), PipelineError> {
        self.store.put("media", key, content, None).await.unwrap();
        let event = ObjectEvent {
            kind: ObjectEventKind::Created,
            bucket: "media".to_string(),
            object_key: key.to_string(),
            etag: Some(etag.to_string()),
            size: Some(content.len() as u64),
            timestamp: Utc.timestamp_millis_opt(mtime_ms).unwrap(),
        };
        self.ingest.handle_event(&event).await
    }

    async fn notify_removed(&self, key: &str) -> Result<(), PipelineError> {
        let event = ObjectEvent {
            kind: ObjectEventKind::Removed,
            bucket: "media".to_string(),
            object_key: key.to_string(),
            etag: None,
            size: None,
            timestamp: Utc::now(),
        };
        self.ingest.handle_event(&event).await
    }

    async fn asset_status(&self, key: &str) -> Option<AssetStatus> {
        self.db
            .find_asset_by_location("media", key)
            .await
            .unwrap()
            .map(|a| a.status)
    }
}

fn asr_one(text: &str, end_ms: i64, confidence: f32) -> AsrResult {
    AsrResult {
        segments: vec![AsrSegment {
            start_ms: 0,
            end_ms,
            text: text.to_string(),
            speaker: None,
            confidence,
        }],
        duration_ms: end_ms,
        engine: "mock".to_string(),
    }
}

async fn wait_until<F, Fut>(mut cond: F, what: &str)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if cond().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

const T0_MS: i64 = 1_700_000_000_000;
const T1_MS: i64 = 1_700_000_100_000;

#[tokio::test]
async fn happy_path_ingest_to_search() {
    let h = Harness::new(vec![ScriptedResponse::Ok(asr_one("hello world", 1000, 0.95))]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();

    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed",
    )
    .await;

    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    let expected_version = derive_version_id("E1", 1024, T0_MS);
    assert_eq!(asset.current_version_id.as_deref(), Some(expected_version.as_str()));

    let versions = h.db.list_versions(&asset.asset_id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].publish_state, PublishState::Active);

    assert_eq!(h.db.count_segments(&expected_version).await.unwrap(), 1);
    assert_eq!(h.db.count_embeddings(&expected_version).await.unwrap(), 1);

    let service = h.search_service();
    let response = service.search(&SearchRequest::new("hello")).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].start_ms, 0);
    assert_eq!(response.results[0].end_ms, 1000);
    assert_eq!(response.results[0].object_key, "hello.wav");

    let mut semantic = SearchRequest::new("hello world");
    semantic.mode = SearchMode::Semantic;
    let response = service.search(&semantic).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].score > 0.0);
}

#[tokio::test]
async fn replayed_event_is_idempotent() {
    let h = Harness::new(vec![ScriptedResponse::Ok(asr_one("hello world", 1000, 0.95))]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();
    // The notification substrate redelivers the same event.
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();

    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed",
    )
    .await;

    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    let versions = h.db.list_versions(&asset.asset_id).await.unwrap();
    assert_eq!(versions.len(), 1);
    let version_id = derive_version_id("E1", 1024, T0_MS);
    assert_eq!(h.db.count_segments(&version_id).await.unwrap(), 1);
}

#[tokio::test]
async fn overwrite_cuts_over_atomically() {
    let h = Harness::new(vec![
        ScriptedResponse::Ok(asr_one("hello world", 1000, 0.95)),
        ScriptedResponse::Ok(asr_one("goodbye", 500, 0.9)),
    ]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();
    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Indexed) },
        "first version indexed",
    )
    .await;

    h.upload_and_notify("hello.wav", &[1u8; 2048], "E2", T1_MS)
        .await
        .unwrap();
    let v2 = derive_version_id("E2", 2048, T1_MS);
    wait_until(
        || async {
            h.db.find_asset_by_location("media", "hello.wav")
                .await
                .unwrap()
                .and_then(|a| a.current_version_id)
                .as_deref()
                == Some(v2.as_str())
        },
        "pointer flipped to second version",
    )
    .await;

    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    let versions = h.db.list_versions(&asset.asset_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    let active: Vec<_> = versions
        .iter()
        .filter(|v| v.publish_state == PublishState::Active)
        .collect();
    assert_eq!(active.len(), 1, "exactly one ACTIVE version");
    assert_eq!(active[0].version_id, v2);

    let service = h.search_service();
    let hello = service.search(&SearchRequest::new("hello")).await.unwrap();
    assert!(hello.results.is_empty(), "archived content must not match");
    let goodbye = service.search(&SearchRequest::new("goodbye")).await.unwrap();
    assert_eq!(goodbye.results.len(), 1);
}

#[tokio::test]
async fn object_removed_tombstones_everything() {
    let h = Harness::new(vec![ScriptedResponse::Ok(asr_one("hello world", 1000, 0.95))]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();
    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed",
    )
    .await;
    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();

    h.notify_removed("hello.wav").await.unwrap();

    let gone = h.db.get_asset(&asset.asset_id).await.unwrap().unwrap();
    assert!(gone.tombstone);
    assert_eq!(gone.status, AssetStatus::Deleted);
    assert!(gone.current_version_id.is_none());

    let service = h.search_service();
    let keyword = service.search(&SearchRequest::new("hello")).await.unwrap();
    assert!(keyword.results.is_empty());
    let mut semantic = SearchRequest::new("hello world");
    semantic.mode = SearchMode::Semantic;
    let response = service.search(&semantic).await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn removal_of_unknown_object_succeeds() {
    let h = Harness::new(vec![]);
    h.notify_removed("never-uploaded.wav").await.unwrap();
}

#[tokio::test]
async fn transient_failures_retry_then_succeed() {
    let h = Harness::new(vec![
        ScriptedResponse::Err(ErrorKind::TransientNetwork, "connection reset".into()),
        ScriptedResponse::Err(ErrorKind::TransientNetwork, "connection reset".into()),
        ScriptedResponse::Err(ErrorKind::TransientNetwork, "connection reset".into()),
        ScriptedResponse::Ok(asr_one("hello world", 1000, 0.95)),
    ]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();

    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed after retries",
    )
    .await;

    assert_eq!(h.engine.call_count(), 4, "three failures then success");
    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.attempt, 3);
    let versions = h.db.list_versions(&asset.asset_id).await.unwrap();
    let active = versions
        .iter()
        .filter(|v| v.publish_state == PublishState::Active)
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn media_format_failure_quarantines_without_retry() {
    let h = Harness::new(vec![ScriptedResponse::Err(
        ErrorKind::MediaFormat,
        "unsupported codec".into(),
    )]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();

    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Quarantined) },
        "asset quarantined",
    )
    .await;

    assert_eq!(h.engine.call_count(), 1, "no re-enqueue for terminal errors");
    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.triage_state, Some(TriageState::NeedsMediaFix));
    assert_eq!(
        asset.recommended_action.as_deref(),
        Some("Re-encode with supported codec or repair corruption")
    );

    let item = h.db.dlq_find_by_asset(&asset.asset_id).await.unwrap().unwrap();
    assert_eq!(item.error.code, "MEDIA_FORMAT");
    assert!(!item.error.retryable);
    assert!(!item.logs.is_empty());
    assert_eq!(h.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn exhausted_retry_budget_dead_letters() {
    let h = Harness::with_settings(
        vec![
            ScriptedResponse::Err(ErrorKind::TransientNetwork, "timeout".into()),
            ScriptedResponse::Err(ErrorKind::TransientNetwork, "timeout".into()),
        ],
        |s| s.max_attempts = 2,
    );
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();

    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Quarantined) },
        "asset quarantined after budget",
    )
    .await;

    // attempt 0 retried; attempt 1 (= MAX_ATTEMPTS - 1) dead-letters.
    assert_eq!(h.engine.call_count(), 2);
    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.triage_state, Some(TriageState::Quarantined));
    assert_eq!(
        asset.recommended_action.as_deref(),
        Some("Manual investigation — retries exhausted")
    );
}

#[tokio::test]
async fn triage_retry_reprocesses_quarantined_asset() {
    let h = Harness::new(vec![
        ScriptedResponse::Err(ErrorKind::MediaFormat, "bad codec".into()),
        ScriptedResponse::Ok(asr_one("fixed now", 1000, 0.9)),
    ]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();
    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Quarantined) },
        "asset quarantined",
    )
    .await;
    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();

    let retry = RetryManager::new(
        h.db.clone() as Arc<dyn MediaDatabase>,
        h.queue.clone(),
        h.settings.clone(),
    );
    retry.triage_retry(&asset.asset_id).await.unwrap();

    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed after operator retry",
    )
    .await;
    let after = h.db.get_asset(&asset.asset_id).await.unwrap().unwrap();
    assert!(after.triage_state.is_none());
    assert!(h.db.dlq_find_by_asset(&asset.asset_id).await.unwrap().is_none());
}

#[tokio::test]
async fn triage_skip_marks_failed_and_clears_dlq() {
    let h = Harness::new(vec![ScriptedResponse::Err(
        ErrorKind::EngineConfig,
        "model not found".into(),
    )]);
    h.upload_and_notify("hello.wav", &[0u8; 1024], "E1", T0_MS)
        .await
        .unwrap();
    wait_until(
        || async { h.asset_status("hello.wav").await == Some(AssetStatus::Quarantined) },
        "asset quarantined",
    )
    .await;
    let asset = h
        .db
        .find_asset_by_location("media", "hello.wav")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.triage_state, Some(TriageState::NeedsEngineTuning));

    let retry = RetryManager::new(
        h.db.clone() as Arc<dyn MediaDatabase>,
        h.queue.clone(),
        h.settings.clone(),
    );
    retry.triage_skip(&asset.asset_id).await.unwrap();

    let after = h.db.get_asset(&asset.asset_id).await.unwrap().unwrap();
    assert_eq!(after.status, AssetStatus::Failed);
    assert!(after.last_error.is_some(), "skip retains the last error");
    assert!(h.db.dlq_find_by_asset(&asset.asset_id).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_transcript_still_publishes() {
    let h = Harness::new(vec![ScriptedResponse::Ok(AsrResult {
        segments: Vec::new(),
        duration_ms: 0,
        engine: "mock".into(),
    })]);
    h.upload_and_notify("silence.wav", &[0u8; 64], "E1", T0_MS)
        .await
        .unwrap();

    wait_until(
        || async { h.asset_status("silence.wav").await == Some(AssetStatus::Indexed) },
        "silent asset indexed",
    )
    .await;

    let asset = h
        .db
        .find_asset_by_location("media", "silence.wav")
        .await
        .unwrap()
        .unwrap();
    let versions = h.db.list_versions(&asset.asset_id).await.unwrap();
    assert_eq!(versions[0].publish_state, PublishState::Active);
    let version_id = derive_version_id("E1", 64, T0_MS);
    assert_eq!(h.db.count_segments(&version_id).await.unwrap(), 0);
    assert_eq!(h.db.count_embeddings(&version_id).await.unwrap(), 0);
}

#[tokio::test]
async fn hybrid_ranking_fuses_both_sources() {
    let h = Harness::new(vec![ScriptedResponse::Ok(AsrResult {
        segments: vec![
            AsrSegment {
                start_ms: 0,
                end_ms: 1000,
                text: "alpha sound recording".into(),
                speaker: None,
                confidence: 0.9,
            },
            AsrSegment {
                start_ms: 1000,
                end_ms: 2000,
                text: "completely different topic".into(),
                speaker: None,
                confidence: 0.9,
            },
        ],
        duration_ms: 2000,
        engine: "mock".into(),
    })]);
    h.upload_and_notify("mix.wav", &[0u8; 256], "E1", T0_MS)
        .await
        .unwrap();
    wait_until(
        || async { h.asset_status("mix.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed",
    )
    .await;

    let service = h.search_service();
    let mut req = SearchRequest::new("alpha sound");
    req.mode = SearchMode::Hybrid;
    let response = service.search(&req).await.unwrap();
    assert!(!response.results.is_empty());
    // The segment matching both keyword and semantics ranks first and is
    // labeled hybrid; scores are the weighted combination, so they stay
    // within [0, 1] for the default 0.5/0.5 weights.
    assert_eq!(response.results[0].snippet, "alpha sound recording");
    assert!(response.results[0].score <= 1.0);
    for window in response.results.windows(2) {
        assert!(window[0].score >= window[1].score, "descending order");
    }
}

#[tokio::test]
async fn search_total_counts_all_matches_beyond_limit() {
    let h = Harness::new(vec![ScriptedResponse::Ok(AsrResult {
        segments: (0..3)
            .map(|i| AsrSegment {
                start_ms: i * 1000,
                end_ms: (i + 1) * 1000,
                text: format!("common phrase number {i}"),
                speaker: None,
                confidence: 0.9,
            })
            .collect(),
        duration_ms: 3000,
        engine: "mock".into(),
    })]);
    h.upload_and_notify("talk.wav", &[0u8; 512], "E1", T0_MS)
        .await
        .unwrap();
    wait_until(
        || async { h.asset_status("talk.wav").await == Some(AssetStatus::Indexed) },
        "asset indexed",
    )
    .await;

    let service = h.search_service();
    let mut req = SearchRequest::new("common");
    req.limit = 1;
    let response = service.search(&req).await.unwrap();
    assert_eq!(response.results.len(), 1, "page honors the limit");
    assert_eq!(response.total, 3, "total reports every match");

    // The second page sees the same total.
    req.offset = 1;
    let response = service.search(&req).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.total, 3);

    let mut hybrid = SearchRequest::new("common");
    hybrid.mode = SearchMode::Hybrid;
    hybrid.limit = 2;
    let response = service.search(&hybrid).await.unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.total, 3);
}

#[tokio::test]
async fn search_rejects_invalid_input() {
    let h = Harness::new(vec![]);
    let service = h.search_service();

    let empty = SearchRequest::new("   ");
    assert!(matches!(
        service.search(&empty).await,
        Err(PipelineError::InvalidInput(_))
    ));

    let mut oversized = SearchRequest::new("q");
    oversized.limit = 500;
    assert!(matches!(
        service.search(&oversized).await,
        Err(PipelineError::InvalidInput(_))
    ));
}
