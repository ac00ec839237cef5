//! SQLite implementation of the database port.
//!
//! Hand-written SQL over `rusqlite`. Multi-statement operations run inside
//! `BEGIN IMMEDIATE` transactions; upserts are keyed exactly as the data
//! model requires so concurrent retries of the same version converge.

mod assets;
mod dlq;
mod jobs;
mod schema;
mod search;
mod transcripts;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::PipelineError;
use crate::models::{
    Asset, AssetStatus, AssetVersion, DlqItem, JobStatus, TranscriptEmbedding, TranscriptSegment,
    TranscriptionJob, TriageState, VersionStatus,
};
use crate::ports::{IngestOutcome, MediaDatabase, ObjectMeta, SegmentHit};

/// SQLite-backed media database.
///
/// Opens a fresh connection per operation; SQLite serializes writers and
/// `busy_timeout` absorbs contention between worker tasks.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    path: PathBuf,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let repo = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = repo.connect()?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(repo)
    }

    pub(crate) fn connect(&self) -> Result<Connection, PipelineError> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Run `body` inside a `BEGIN IMMEDIATE` transaction, committing on
    /// success and rolling back on error.
    pub(crate) fn with_txn<T>(
        &self,
        body: impl FnOnce(&Connection) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let conn = self.connect()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match body(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on
/// error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[async_trait]
impl MediaDatabase for SqliteRepository {
    async fn record_object_version(
        &self,
        bucket: &str,
        key: &str,
        meta: &ObjectMeta,
        version_id: &str,
        engine: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        self.record_object_version_sync(bucket, key, meta, version_id, engine)
    }

    async fn tombstone_asset(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<String>, PipelineError> {
        self.tombstone_asset_sync(bucket, key)
    }

    async fn get_asset(&self, asset_id: &str) -> Result<Option<Asset>, PipelineError> {
        self.get_asset_sync(asset_id)
    }

    async fn find_asset_by_location(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<Asset>, PipelineError> {
        let conn = self.connect()?;
        assets::find_live_by_location(&conn, bucket, key)
    }

    async fn update_asset_status(
        &self,
        asset_id: &str,
        status: AssetStatus,
    ) -> Result<(), PipelineError> {
        self.update_asset_status_sync(asset_id, status)
    }

    async fn update_asset_media_info(
        &self,
        asset_id: &str,
        duration_ms: Option<i64>,
        codec_info: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.update_asset_media_info_sync(asset_id, duration_ms, codec_info)
    }

    async fn mark_retry_pending(
        &self,
        asset_id: &str,
        last_error: &str,
        attempt: u32,
    ) -> Result<(), PipelineError> {
        self.mark_retry_pending_sync(asset_id, last_error, attempt)
    }

    async fn quarantine_asset(
        &self,
        asset_id: &str,
        triage_state: TriageState,
        recommended_action: &str,
        last_error: &str,
        attempt: u32,
    ) -> Result<(), PipelineError> {
        self.quarantine_asset_sync(asset_id, triage_state, recommended_action, last_error, attempt)
    }

    async fn clear_triage(&self, asset_id: &str) -> Result<(), PipelineError> {
        self.clear_triage_sync(asset_id)
    }

    async fn mark_failed(&self, asset_id: &str) -> Result<(), PipelineError> {
        self.mark_failed_sync(asset_id)
    }

    async fn list_quarantined(&self) -> Result<Vec<Asset>, PipelineError> {
        self.list_quarantined_sync()
    }

    async fn get_version(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<Option<AssetVersion>, PipelineError> {
        self.get_version_sync(asset_id, version_id)
    }

    async fn list_versions(&self, asset_id: &str) -> Result<Vec<AssetVersion>, PipelineError> {
        self.list_versions_sync(asset_id)
    }

    async fn set_version_status(
        &self,
        asset_id: &str,
        version_id: &str,
        status: VersionStatus,
    ) -> Result<(), PipelineError> {
        self.set_version_status_sync(asset_id, version_id, status)
    }

    async fn purge_archived(&self, cutoff: DateTime<Utc>) -> Result<usize, PipelineError> {
        self.purge_archived_sync(cutoff)
    }

    async fn replace_segments(
        &self,
        asset_id: &str,
        version_id: &str,
        segments: &[TranscriptSegment],
    ) -> Result<(), PipelineError> {
        self.replace_segments_sync(asset_id, version_id, segments)
    }

    async fn upsert_embeddings(
        &self,
        embeddings: &[TranscriptEmbedding],
    ) -> Result<(), PipelineError> {
        self.upsert_embeddings_sync(embeddings)
    }

    async fn count_segments(&self, version_id: &str) -> Result<usize, PipelineError> {
        self.count_rows("transcript_segments", version_id)
    }

    async fn count_embeddings(&self, version_id: &str) -> Result<usize, PipelineError> {
        self.count_rows("transcript_embeddings", version_id)
    }

    async fn publish_version(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<(), PipelineError> {
        self.publish_version_sync(asset_id, version_id)
    }

    async fn keyword_search(
        &self,
        query: &str,
        bucket: Option<&str>,
        speaker: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SegmentHit>, PipelineError> {
        self.keyword_search_sync(query, bucket, speaker, limit, offset)
    }

    async fn semantic_search(
        &self,
        vector: &[f32],
        bucket: Option<&str>,
        speaker: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SegmentHit>, PipelineError> {
        self.semantic_search_sync(vector, bucket, speaker, limit, offset)
    }

    async fn count_matches(
        &self,
        query: Option<&str>,
        vector: Option<&[f32]>,
        bucket: Option<&str>,
        speaker: Option<&str>,
    ) -> Result<usize, PipelineError> {
        self.count_matches_sync(query, vector, bucket, speaker)
    }

    async fn record_job(&self, job: &TranscriptionJob) -> Result<(), PipelineError> {
        self.record_job_sync(job)
    }

    async fn mark_job_running(&self, job_id: &str) -> Result<(), PipelineError> {
        self.mark_job_running_sync(job_id)
    }

    async fn mark_job_finished(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.mark_job_finished_sync(job_id, status, error)
    }

    async fn dlq_add(&self, item: &DlqItem) -> Result<(), PipelineError> {
        self.dlq_add_sync(item)
    }

    async fn dlq_get(&self, dlq_id: &str) -> Result<Option<DlqItem>, PipelineError> {
        self.dlq_get_sync(dlq_id)
    }

    async fn dlq_find_by_asset(
        &self,
        asset_id: &str,
    ) -> Result<Option<DlqItem>, PipelineError> {
        self.dlq_find_by_asset_sync(asset_id)
    }

    async fn dlq_list(&self) -> Result<Vec<DlqItem>, PipelineError> {
        self.dlq_list_sync()
    }

    async fn dlq_remove(&self, dlq_id: &str) -> Result<(), PipelineError> {
        self.dlq_remove_sync(dlq_id)
    }
}
