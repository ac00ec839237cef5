//! Database contract.
//!
//! Every method that touches more than one row executes as a single
//! transaction inside the adapter; the observable ordering rules (atomic
//! publish cutover, all-or-nothing tombstone) are part of this contract,
//! not of any particular engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::models::{
    Asset, AssetStatus, AssetVersion, DlqItem, JobStatus, TranscriptEmbedding, TranscriptSegment,
    TranscriptionJob, TriageState, VersionStatus,
};
use crate::ports::ObjectMeta;

/// Result of recording an object version at ingest.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// New version recorded; a transcription job should be enqueued.
    Recorded { asset: Asset, version: AssetVersion },
    /// The version id is already known for this asset; no-op.
    Duplicate { asset: Asset },
}

/// A scored segment row returned by the search primitives.
///
/// Rows already satisfy the hard visibility filters: ACTIVE rows of the
/// asset's current version, asset not tombstoned.
#[derive(Debug, Clone)]
pub struct SegmentHit {
    pub asset_id: String,
    pub version_id: String,
    pub segment_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub speaker: Option<String>,
    pub score: f32,
    pub created_at: DateTime<Utc>,
    pub bucket: String,
    pub object_key: String,
}

/// Transactional persistence for assets, transcript data, jobs and the DLQ.
#[async_trait]
pub trait MediaDatabase: Send + Sync {
    // ---- ingest ----

    /// The ObjectCreated transaction: find-or-create the asset for
    /// `(bucket, key)`, reviving a tombstoned predecessor's lineage id;
    /// create the version at STAGING unless the version id already exists.
    async fn record_object_version(
        &self,
        bucket: &str,
        key: &str,
        meta: &ObjectMeta,
        version_id: &str,
        engine: &str,
    ) -> Result<IngestOutcome, PipelineError>;

    /// The ObjectRemoved transaction: tombstone the asset, null its
    /// current-version pointer, soft-delete every segment and embedding.
    /// Returns the asset id, or None when no live asset matches.
    async fn tombstone_asset(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<String>, PipelineError>;

    // ---- assets ----

    async fn get_asset(&self, asset_id: &str) -> Result<Option<Asset>, PipelineError>;

    /// Lookup by `(bucket, object_key)` among non-tombstoned assets.
    /// The single implementation of this lookup; both ingest paths use it.
    async fn find_asset_by_location(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<Asset>, PipelineError>;

    async fn update_asset_status(
        &self,
        asset_id: &str,
        status: AssetStatus,
    ) -> Result<(), PipelineError>;

    /// Record media hints discovered during transcription.
    async fn update_asset_media_info(
        &self,
        asset_id: &str,
        duration_ms: Option<i64>,
        codec_info: Option<&str>,
    ) -> Result<(), PipelineError>;

    /// Transient failure: status PENDING_RETRY, last-error and attempt
    /// counter updated.
    async fn mark_retry_pending(
        &self,
        asset_id: &str,
        last_error: &str,
        attempt: u32,
    ) -> Result<(), PipelineError>;

    /// Terminal failure: status QUARANTINED with triage classification.
    async fn quarantine_asset(
        &self,
        asset_id: &str,
        triage_state: TriageState,
        recommended_action: &str,
        last_error: &str,
        attempt: u32,
    ) -> Result<(), PipelineError>;

    /// Operator retry: clear triage-state and last-error, status
    /// PENDING_RETRY.
    async fn clear_triage(&self, asset_id: &str) -> Result<(), PipelineError>;

    /// Operator skip: status FAILED, last-error retained.
    async fn mark_failed(&self, asset_id: &str) -> Result<(), PipelineError>;

    async fn list_quarantined(&self) -> Result<Vec<Asset>, PipelineError>;

    // ---- versions ----

    /// Version ids are content-derived and unique only per asset, so every
    /// version lookup is asset-scoped.
    async fn get_version(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<Option<AssetVersion>, PipelineError>;

    async fn list_versions(&self, asset_id: &str) -> Result<Vec<AssetVersion>, PipelineError>;

    async fn set_version_status(
        &self,
        asset_id: &str,
        version_id: &str,
        status: VersionStatus,
    ) -> Result<(), PipelineError>;

    /// Delete ARCHIVED versions (and their rows) created before the cutoff.
    /// Returns the number of versions purged.
    async fn purge_archived(&self, cutoff: DateTime<Utc>) -> Result<usize, PipelineError>;

    // ---- transcript data ----

    /// Idempotent replacement of a version's segments (stale embeddings for
    /// the version are dropped in the same transaction): re-running the
    /// orchestrator on the same version converges to the same row set.
    async fn replace_segments(
        &self,
        asset_id: &str,
        version_id: &str,
        segments: &[TranscriptSegment],
    ) -> Result<(), PipelineError>;

    /// Idempotent upsert keyed on `(asset_id, version_id, segment_id)`.
    async fn upsert_embeddings(
        &self,
        embeddings: &[TranscriptEmbedding],
    ) -> Result<(), PipelineError>;

    async fn count_segments(&self, version_id: &str) -> Result<usize, PipelineError>;

    async fn count_embeddings(&self, version_id: &str) -> Result<usize, PipelineError>;

    /// Atomic visibility cutover. In one transaction: archive the previous
    /// current version's rows, promote this version's rows STAGING→ACTIVE,
    /// set the current-version pointer, mark the asset INDEXED and the
    /// version PUBLISHED. Publishing an already-current ACTIVE version is
    /// a no-op.
    async fn publish_version(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<(), PipelineError>;

    // ---- search primitives ----

    /// Keyword search over ACTIVE current-version segments.
    async fn keyword_search(
        &self,
        query: &str,
        bucket: Option<&str>,
        speaker: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SegmentHit>, PipelineError>;

    /// Cosine-distance search over ACTIVE current-version embeddings.
    /// `vector` must have the configured dimension.
    async fn semantic_search(
        &self,
        vector: &[f32],
        bucket: Option<&str>,
        speaker: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SegmentHit>, PipelineError>;

    /// Unbounded count of segments the search primitives would match,
    /// independent of any page window. `query` counts keyword matches,
    /// `vector` counts segments with an embedding of that dimension, and
    /// passing both counts the union (the hybrid candidate set). At least
    /// one of the two must be given.
    async fn count_matches(
        &self,
        query: Option<&str>,
        vector: Option<&[f32]>,
        bucket: Option<&str>,
        speaker: Option<&str>,
    ) -> Result<usize, PipelineError>;

    // ---- job journal ----

    async fn record_job(&self, job: &TranscriptionJob) -> Result<(), PipelineError>;

    async fn mark_job_running(&self, job_id: &str) -> Result<(), PipelineError>;

    async fn mark_job_finished(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), PipelineError>;

    // ---- dead-letter queue ----

    async fn dlq_add(&self, item: &DlqItem) -> Result<(), PipelineError>;

    async fn dlq_get(&self, dlq_id: &str) -> Result<Option<DlqItem>, PipelineError>;

    async fn dlq_find_by_asset(&self, asset_id: &str)
        -> Result<Option<DlqItem>, PipelineError>;

    async fn dlq_list(&self) -> Result<Vec<DlqItem>, PipelineError>;

    async fn dlq_remove(&self, dlq_id: &str) -> Result<(), PipelineError>;
}
