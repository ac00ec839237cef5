//! Ingest controller.
//!
//! Reacts to object store events: derives the deterministic version id,
//! records assets and versions, and enqueues transcription work. Removal
//! events tombstone the asset and soft-delete its transcript data.

use std::sync::Arc;

use mediasearch::config::Settings;
use mediasearch::models::{derive_version_id, EnginePolicy, TranscriptionJob};
use mediasearch::ports::{
    IngestOutcome, JobQueue, MediaDatabase, ObjectEvent, ObjectEventKind, ObjectMeta, ObjectStore,
};
use mediasearch::PipelineError;
use tracing::{debug, info, warn};

/// Extensions accepted for ingest, lowercase.
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["wav", "mp3", "aac", "flac", "mp4", "mov", "mxf"];

/// Whether the key's extension is in the supported media set.
pub fn is_supported_media(key: &str) -> bool {
    key.rsplit('.')
        .next()
        .map(|ext| {
            let ext = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub struct IngestController {
    db: Arc<dyn MediaDatabase>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn JobQueue>,
    settings: Settings,
}

impl IngestController {
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn JobQueue>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            store,
            queue,
            settings,
        }
    }

    pub async fn handle_event(&self, event: &ObjectEvent) -> Result<(), PipelineError> {
        match event.kind {
            ObjectEventKind::Created => self.handle_created(event).await,
            ObjectEventKind::Removed => self.handle_removed(event).await,
        }
    }

    /// ObjectCreated: filter by extension, backfill metadata, record the
    /// version, enqueue a job. Redeliveries of identical content converge
    /// on the same version id and the queue's idempotency-key dedup.
    async fn handle_created(&self, event: &ObjectEvent) -> Result<(), PipelineError> {
        if !is_supported_media(&event.object_key) {
            debug!(
                bucket = %event.bucket,
                key = %event.object_key,
                "ignoring unsupported media extension"
            );
            return Ok(());
        }

        let meta = self.authoritative_meta(event).await?;
        let version_id = derive_version_id(&meta.etag, meta.size, meta.mtime.timestamp_millis());

        let outcome = self
            .db
            .record_object_version(
                &event.bucket,
                &event.object_key,
                &meta,
                &version_id,
                &self.settings.asr_engine,
            )
            .await?;

        match outcome {
            IngestOutcome::Recorded { asset, version } => {
                info!(
                    asset_id = %asset.asset_id,
                    version_id = %version.version_id,
                    bucket = %event.bucket,
                    key = %event.object_key,
                    "new version ingested"
                );
                self.enqueue_initial_job(&asset.asset_id, &version.version_id)
                    .await
            }
            IngestOutcome::Duplicate { asset } => {
                // A replayed notification. If the version never finished
                // processing (e.g. the first enqueue was lost), the
                // idempotency key makes re-enqueueing safe.
                let version = self
                    .db
                    .get_version(&asset.asset_id, &version_id)
                    .await?
                    .ok_or_else(|| {
                        PipelineError::Internal(format!(
                            "duplicate outcome but version {version_id} missing"
                        ))
                    })?;
                if version.is_processed() {
                    debug!(version_id = %version_id, "replayed event for processed version");
                    Ok(())
                } else {
                    self.enqueue_initial_job(&asset.asset_id, &version_id).await
                }
            }
        }
    }

    /// ObjectRemoved: tombstone in one transaction; a missing asset is
    /// logged and treated as success.
    async fn handle_removed(&self, event: &ObjectEvent) -> Result<(), PipelineError> {
        match self
            .db
            .tombstone_asset(&event.bucket, &event.object_key)
            .await?
        {
            Some(asset_id) => {
                info!(%asset_id, key = %event.object_key, "asset tombstoned on removal");
                Ok(())
            }
            None => {
                warn!(
                    bucket = %event.bucket,
                    key = %event.object_key,
                    "removal event for unknown object"
                );
                Ok(())
            }
        }
    }

    /// Use event fields when complete; otherwise ask the store.
    async fn authoritative_meta(&self, event: &ObjectEvent) -> Result<ObjectMeta, PipelineError> {
        match (&event.etag, event.size) {
            (Some(etag), Some(size)) => Ok(ObjectMeta {
                etag: etag.clone(),
                size,
                content_type: None,
                mtime: event.timestamp,
            }),
            _ => self.store.head(&event.bucket, &event.object_key).await,
        }
    }

    async fn enqueue_initial_job(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<(), PipelineError> {
        let policy = EnginePolicy::new(
            self.settings.asr_engine.clone(),
            self.settings.compute_threshold_seconds,
        );
        let job = TranscriptionJob::new(asset_id, version_id, policy, 0);
        self.db.record_job(&job).await?;
        self.queue.enqueue(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_media("clip.wav"));
        assert!(is_supported_media("CLIP.WAV"));
        assert!(is_supported_media("folder/deep/video.MxF"));
        assert!(!is_supported_media("notes.txt"));
        assert!(!is_supported_media("archive.tar.gz"));
        assert!(!is_supported_media("no_extension"));
    }
}
