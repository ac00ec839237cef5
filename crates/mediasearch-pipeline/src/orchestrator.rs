//! Job orchestrator.
//!
//! Drives each transcription job through five phases: idempotency gate,
//! fetch + transcribe, segmentation, embedding, publish. Every phase is
//! restartable; intermediate writes land at STAGING visibility, so a
//! re-run overwrites them and readers never see partial transcripts.

use std::sync::Arc;

use chrono::Utc;
use mediasearch::config::Settings;
use mediasearch::models::{
    AssetStatus, TranscriptEmbedding, TranscriptSegment, TranscriptionJob, VersionStatus,
    Visibility,
};
use mediasearch::ports::{Embedder, MediaDatabase, ObjectStore, SpeechEngine, TranscribeOptions};
use mediasearch::segmenter::{self, DEFAULT_WINDOW_MS};
use mediasearch::PipelineError;
use tracing::{debug, info};

use crate::publisher::Publisher;

pub struct Orchestrator {
    db: Arc<dyn MediaDatabase>,
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn SpeechEngine>,
    embedder: Arc<dyn Embedder>,
    publisher: Publisher,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn SpeechEngine>,
        embedder: Arc<dyn Embedder>,
        settings: Settings,
    ) -> Self {
        Self {
            publisher: Publisher::new(Arc::clone(&db)),
            db,
            store,
            engine,
            embedder,
            settings,
        }
    }

    /// Process one job to completion. Errors are classified by the retry
    /// manager at the call site.
    pub async fn process_job(&self, job: &TranscriptionJob) -> Result<(), PipelineError> {
        // Phase 1: idempotency gate.
        let version = self
            .db
            .get_version(&job.asset_id, &job.version_id)
            .await?
            .ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "version {} of asset {}",
                    job.version_id, job.asset_id
                ))
            })?;
        if version.is_processed() {
            debug!(
                version_id = %job.version_id,
                "version already processed, acking job"
            );
            return Ok(());
        }
        let asset = self
            .db
            .get_asset(&job.asset_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("asset {}", job.asset_id)))?;
        if asset.tombstone {
            debug!(asset_id = %asset.asset_id, "asset tombstoned while queued, dropping job");
            return Ok(());
        }

        // Phase 2: fetch + transcribe.
        self.db
            .update_asset_status(&asset.asset_id, AssetStatus::Transcribing)
            .await?;
        let media = self.store.get(&asset.bucket, &asset.object_key).await?;
        let opts = TranscribeOptions {
            diarization: job.engine_policy.diarization_enabled,
            execution_mode: job.engine_policy.execution_mode,
            language: job.engine_policy.language.clone(),
            content_type: asset.content_type.clone(),
            duration_hint_ms: asset.duration_ms,
        };
        let asr = self.engine.transcribe(&media, &opts).await?;
        self.db
            .update_asset_media_info(&asset.asset_id, Some(asr.duration_ms), None)
            .await?;

        // Phase 3: segmentation.
        let strategy = segmenter::choose_strategy(asr.duration_ms, &job.engine_policy);
        let drafts = segmenter::segment_transcript(&asr, strategy, DEFAULT_WINDOW_MS);
        let segments: Vec<TranscriptSegment> = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| TranscriptSegment {
                segment_id: TranscriptSegment::segment_id_for(&job.version_id, index),
                asset_id: asset.asset_id.clone(),
                version_id: job.version_id.clone(),
                start_ms: draft.start_ms,
                end_ms: draft.end_ms,
                text: draft.text,
                speaker: draft.speaker,
                confidence: draft.confidence,
                visibility: Visibility::Staging,
                chunking_strategy: strategy,
                created_at: Utc::now(),
            })
            .collect();
        self.db
            .replace_segments(&asset.asset_id, &job.version_id, &segments)
            .await?;
        self.db
            .set_version_status(&asset.asset_id, &job.version_id, VersionStatus::Transcribed)
            .await?;
        self.db
            .update_asset_status(&asset.asset_id, AssetStatus::Transcribed)
            .await?;
        info!(
            asset_id = %asset.asset_id,
            version_id = %job.version_id,
            segments = segments.len(),
            strategy = strategy.as_str(),
            "transcript segmented"
        );

        // Phase 4: embedding.
        if self.settings.semantic_search_enabled && !segments.is_empty() {
            let embeddings = self.embed_segments(&segments).await?;
            self.db.upsert_embeddings(&embeddings).await?;
        }

        // Phase 5: publish.
        self.publisher
            .publish(&asset.asset_id, &job.version_id)
            .await
    }

    async fn embed_segments(
        &self,
        segments: &[TranscriptSegment],
    ) -> Result<Vec<TranscriptEmbedding>, PipelineError> {
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        let batch = self
            .settings
            .embed_batch_size
            .min(self.embedder.batch_limit())
            .max(1);
        for chunk in texts.chunks(batch) {
            vectors.extend(self.embedder.embed_batch(chunk).await?);
        }
        if vectors.len() != segments.len() {
            return Err(PipelineError::Internal(format!(
                "embedder returned {} vectors for {} segments",
                vectors.len(),
                segments.len()
            )));
        }

        let expected = self.settings.embedding_dimension;
        segments
            .iter()
            .zip(vectors)
            .map(|(segment, vector)| {
                if vector.len() != expected {
                    // Schema/dimension mismatch is a configuration problem,
                    // not a transient one: route to quarantine.
                    return Err(PipelineError::EngineConfig(format!(
                        "embedding dimension {} does not match configured {}",
                        vector.len(),
                        expected
                    )));
                }
                Ok(TranscriptEmbedding::new(
                    segment,
                    vector,
                    self.embedder.model_name(),
                ))
            })
            .collect()
    }
}
