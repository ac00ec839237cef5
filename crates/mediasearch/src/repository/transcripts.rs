//! Version, segment, and embedding operations, including the atomic
//! publish cutover.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::models::{
    AssetStatus, AssetVersion, PublishState, TranscriptEmbedding, TranscriptSegment,
    VersionStatus,
};

use super::{parse_datetime, SqliteRepository};

pub(crate) fn row_to_version(row: &Row<'_>) -> rusqlite::Result<AssetVersion> {
    Ok(AssetVersion {
        version_id: row.get("version_id")?,
        asset_id: row.get("asset_id")?,
        status: VersionStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(VersionStatus::Ingested),
        publish_state: PublishState::from_str(&row.get::<_, String>("publish_state")?)
            .unwrap_or(PublishState::Staging),
        etag: row.get("etag")?,
        file_size: row.get::<_, i64>("file_size")? as u64,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

/// Encode an embedding vector as a little-endian f32 blob.
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub(crate) fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl SqliteRepository {
    pub(crate) fn get_version_sync(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<Option<AssetVersion>, PipelineError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM asset_versions WHERE asset_id = ? AND version_id = ?",
            params![asset_id, version_id],
            row_to_version,
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn list_versions_sync(
        &self,
        asset_id: &str,
    ) -> Result<Vec<AssetVersion>, PipelineError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM asset_versions WHERE asset_id = ? ORDER BY created_at DESC",
        )?;
        let versions = stmt
            .query_map(params![asset_id], row_to_version)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    pub(crate) fn set_version_status_sync(
        &self,
        asset_id: &str,
        version_id: &str,
        status: VersionStatus,
    ) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE asset_versions SET status = ? WHERE asset_id = ? AND version_id = ?",
            params![status.as_str(), asset_id, version_id],
        )?;
        if changed == 0 {
            return Err(PipelineError::NotFound(format!(
                "version {version_id} of asset {asset_id}"
            )));
        }
        Ok(())
    }

    /// Replace a version's segments (and drop its embeddings) in one
    /// transaction. Re-runs converge on the same row set.
    pub(crate) fn replace_segments_sync(
        &self,
        asset_id: &str,
        version_id: &str,
        segments: &[TranscriptSegment],
    ) -> Result<(), PipelineError> {
        self.with_txn(|conn| {
            conn.execute(
                "DELETE FROM transcript_segments WHERE asset_id = ? AND version_id = ?",
                params![asset_id, version_id],
            )?;
            conn.execute(
                "DELETE FROM transcript_embeddings WHERE asset_id = ? AND version_id = ?",
                params![asset_id, version_id],
            )?;
            for seg in segments {
                conn.execute(
                    "INSERT INTO transcript_segments
                     (segment_id, asset_id, version_id, start_ms, end_ms, text,
                      speaker, confidence, visibility, chunking_strategy, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        seg.segment_id,
                        seg.asset_id,
                        seg.version_id,
                        seg.start_ms,
                        seg.end_ms,
                        seg.text,
                        seg.speaker,
                        seg.confidence as f64,
                        seg.visibility.as_str(),
                        seg.chunking_strategy.as_str(),
                        seg.created_at.to_rfc3339(),
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub(crate) fn upsert_embeddings_sync(
        &self,
        embeddings: &[TranscriptEmbedding],
    ) -> Result<(), PipelineError> {
        self.with_txn(|conn| {
            for emb in embeddings {
                conn.execute(
                    "INSERT INTO transcript_embeddings
                     (embedding_id, asset_id, version_id, segment_id, embedding,
                      model, dimension, visibility, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT (asset_id, version_id, segment_id) DO UPDATE SET
                        embedding = excluded.embedding,
                        model = excluded.model,
                        dimension = excluded.dimension,
                        visibility = excluded.visibility",
                    params![
                        emb.embedding_id,
                        emb.asset_id,
                        emb.version_id,
                        emb.segment_id,
                        vector_to_blob(&emb.vector),
                        emb.model,
                        emb.dimension as i64,
                        emb.visibility.as_str(),
                        emb.created_at.to_rfc3339(),
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub(crate) fn count_rows(&self, table: &str, version_id: &str) -> Result<usize, PipelineError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE version_id = ?"),
            params![version_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// The atomic cutover: archive the previous current version, promote
    /// the new one, flip the pointer, all inside one transaction so
    /// readers see either the old transcript or the new one, never both.
    pub(crate) fn publish_version_sync(
        &self,
        asset_id: &str,
        version_id: &str,
    ) -> Result<(), PipelineError> {
        self.with_txn(|conn| {
            let asset_row: Option<(Option<String>, i64)> = conn
                .query_row(
                    "SELECT current_version_id, tombstone FROM media_assets WHERE asset_id = ?",
                    params![asset_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((current, tombstone)) = asset_row else {
                return Err(PipelineError::NotFound(format!("asset {asset_id}")));
            };
            if tombstone != 0 {
                return Err(PipelineError::Internal(format!(
                    "publish requested for tombstoned asset {asset_id}"
                )));
            }

            let version: Option<String> = conn
                .query_row(
                    "SELECT publish_state FROM asset_versions
                     WHERE asset_id = ? AND version_id = ?",
                    params![asset_id, version_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(publish_state) = version else {
                return Err(PipelineError::NotFound(format!(
                    "version {version_id} of asset {asset_id}"
                )));
            };

            if current.as_deref() == Some(version_id)
                && publish_state == PublishState::Active.as_str()
            {
                // Already current and ACTIVE; publish is idempotent.
                return Ok(());
            }
            if publish_state == PublishState::SoftDeleted.as_str() {
                error!(asset_id, version_id, "refusing to publish soft-deleted version");
                return Err(PipelineError::Internal(format!(
                    "version {version_id} is soft-deleted"
                )));
            }

            if let Some(old_version) = current.as_deref().filter(|v| *v != version_id) {
                conn.execute(
                    "UPDATE asset_versions SET publish_state = ?
                     WHERE asset_id = ? AND version_id = ?",
                    params![PublishState::Archived.as_str(), asset_id, old_version],
                )?;
                conn.execute(
                    "UPDATE transcript_segments SET visibility = ?
                     WHERE asset_id = ? AND version_id = ?",
                    params![PublishState::Archived.as_str(), asset_id, old_version],
                )?;
                conn.execute(
                    "UPDATE transcript_embeddings SET visibility = ?
                     WHERE asset_id = ? AND version_id = ?",
                    params![PublishState::Archived.as_str(), asset_id, old_version],
                )?;
            }

            conn.execute(
                "UPDATE asset_versions SET publish_state = ?, status = ?
                 WHERE asset_id = ? AND version_id = ?",
                params![
                    PublishState::Active.as_str(),
                    VersionStatus::Published.as_str(),
                    asset_id,
                    version_id,
                ],
            )?;
            conn.execute(
                "UPDATE transcript_segments SET visibility = ?
                 WHERE asset_id = ? AND version_id = ?",
                params![PublishState::Active.as_str(), asset_id, version_id],
            )?;
            conn.execute(
                "UPDATE transcript_embeddings SET visibility = ?
                 WHERE asset_id = ? AND version_id = ?",
                params![PublishState::Active.as_str(), asset_id, version_id],
            )?;
            conn.execute(
                "UPDATE media_assets
                 SET current_version_id = ?, status = ?, updated_at = ?
                 WHERE asset_id = ?",
                params![
                    version_id,
                    AssetStatus::Indexed.as_str(),
                    Utc::now().to_rfc3339(),
                    asset_id,
                ],
            )?;

            info!(asset_id, version_id, "version published");
            Ok(())
        })
    }

    /// Delete ARCHIVED versions (with their segments and embeddings)
    /// created before the cutoff.
    pub(crate) fn purge_archived_sync(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        self.with_txn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT asset_id, version_id FROM asset_versions
                 WHERE publish_state = ? AND created_at < ?",
            )?;
            let targets = stmt
                .query_map(
                    params![PublishState::Archived.as_str(), cutoff.to_rfc3339()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )?
                .collect::<Result<Vec<_>, _>>()?;
            drop(stmt);

            for (asset_id, version_id) in &targets {
                conn.execute(
                    "DELETE FROM transcript_segments WHERE asset_id = ? AND version_id = ?",
                    params![asset_id, version_id],
                )?;
                conn.execute(
                    "DELETE FROM transcript_embeddings WHERE asset_id = ? AND version_id = ?",
                    params![asset_id, version_id],
                )?;
                conn.execute(
                    "DELETE FROM asset_versions WHERE asset_id = ? AND version_id = ?",
                    params![asset_id, version_id],
                )?;
            }
            if !targets.is_empty() {
                warn!(purged = targets.len(), "archived versions purged");
            }
            Ok(targets.len())
        })
    }
}
