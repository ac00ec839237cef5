//! Asset operations: ingest and tombstone transactions, status updates,
//! triage transitions.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::models::{
    Asset, AssetStatus, AssetVersion, PublishState, TriageState, VersionStatus,
};
use crate::ports::{IngestOutcome, ObjectMeta};

use super::{parse_datetime, SqliteRepository};

pub(crate) fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        asset_id: row.get("asset_id")?,
        lineage_id: row.get("lineage_id")?,
        bucket: row.get("bucket")?,
        object_key: row.get("object_key")?,
        current_version_id: row.get("current_version_id")?,
        status: AssetStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(AssetStatus::Ingested),
        triage_state: row
            .get::<_, Option<String>>("triage_state")?
            .as_deref()
            .and_then(TriageState::from_str),
        recommended_action: row.get("recommended_action")?,
        engine: row.get("engine")?,
        last_error: row.get("last_error")?,
        attempt: row.get::<_, i64>("attempt")? as u32,
        file_size: row.get::<_, i64>("file_size")? as u64,
        content_type: row.get("content_type")?,
        etag: row.get("etag")?,
        duration_ms: row.get("duration_ms")?,
        codec_info: row.get("codec_info")?,
        tombstone: row.get::<_, i64>("tombstone")? != 0,
        ingest_time: parse_datetime(&row.get::<_, String>("ingest_time")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

/// Lookup by `(bucket, object_key)` among non-tombstoned assets.
pub(crate) fn find_live_by_location(
    conn: &Connection,
    bucket: &str,
    key: &str,
) -> Result<Option<Asset>, PipelineError> {
    conn.query_row(
        "SELECT * FROM media_assets WHERE bucket = ? AND object_key = ? AND tombstone = 0",
        params![bucket, key],
        row_to_asset,
    )
    .optional()
    .map_err(Into::into)
}

fn insert_asset(conn: &Connection, asset: &Asset) -> Result<(), PipelineError> {
    conn.execute(
        r#"
        INSERT INTO media_assets (
            asset_id, lineage_id, bucket, object_key, current_version_id,
            status, triage_state, recommended_action, engine, last_error,
            attempt, file_size, content_type, etag, duration_ms, codec_info,
            tombstone, ingest_time, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            asset.asset_id,
            asset.lineage_id,
            asset.bucket,
            asset.object_key,
            asset.current_version_id,
            asset.status.as_str(),
            asset.triage_state.map(|t| t.as_str()),
            asset.recommended_action,
            asset.engine,
            asset.last_error,
            asset.attempt as i64,
            asset.file_size as i64,
            asset.content_type,
            asset.etag,
            asset.duration_ms,
            asset.codec_info,
            asset.tombstone as i64,
            asset.ingest_time.to_rfc3339(),
            asset.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl SqliteRepository {
    pub(crate) fn record_object_version_sync(
        &self,
        bucket: &str,
        key: &str,
        meta: &ObjectMeta,
        version_id: &str,
        engine: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        self.with_txn(|conn| {
            let asset = match find_live_by_location(conn, bucket, key)? {
                Some(mut existing) => {
                    conn.execute(
                        "UPDATE media_assets
                         SET etag = ?, file_size = ?, content_type = ?, updated_at = ?
                         WHERE asset_id = ?",
                        params![
                            meta.etag,
                            meta.size as i64,
                            meta.content_type,
                            Utc::now().to_rfc3339(),
                            existing.asset_id,
                        ],
                    )?;
                    existing.etag = Some(meta.etag.clone());
                    existing.file_size = meta.size;
                    existing.content_type = meta.content_type.clone();
                    existing
                }
                None => {
                    // A tombstoned predecessor at the same location passes
                    // its lineage id to the new asset.
                    let lineage: Option<String> = conn
                        .query_row(
                            "SELECT lineage_id FROM media_assets
                             WHERE bucket = ? AND object_key = ? AND tombstone = 1
                             ORDER BY updated_at DESC LIMIT 1",
                            params![bucket, key],
                            |row| row.get(0),
                        )
                        .optional()?;

                    let mut asset = Asset::new(bucket, key, engine);
                    if let Some(lineage_id) = lineage {
                        debug!(bucket, key, %lineage_id, "reviving lineage for reuploaded key");
                        asset.lineage_id = lineage_id;
                    }
                    asset.etag = Some(meta.etag.clone());
                    asset.file_size = meta.size;
                    asset.content_type = meta.content_type.clone();
                    insert_asset(conn, &asset)?;
                    asset
                }
            };

            let existing_version: Option<String> = conn
                .query_row(
                    "SELECT version_id FROM asset_versions
                     WHERE asset_id = ? AND version_id = ?",
                    params![asset.asset_id, version_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing_version.is_some() {
                debug!(asset_id = %asset.asset_id, version_id, "version already known, no-op");
                return Ok(IngestOutcome::Duplicate { asset });
            }

            let version = AssetVersion {
                version_id: version_id.to_string(),
                asset_id: asset.asset_id.clone(),
                status: VersionStatus::Ingested,
                publish_state: PublishState::Staging,
                etag: meta.etag.clone(),
                file_size: meta.size,
                created_at: Utc::now(),
            };
            conn.execute(
                "INSERT INTO asset_versions
                 (version_id, asset_id, status, publish_state, etag, file_size, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    version.version_id,
                    version.asset_id,
                    version.status.as_str(),
                    version.publish_state.as_str(),
                    version.etag,
                    version.file_size as i64,
                    version.created_at.to_rfc3339(),
                ],
            )?;

            Ok(IngestOutcome::Recorded { asset, version })
        })
    }

    pub(crate) fn tombstone_asset_sync(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<String>, PipelineError> {
        self.with_txn(|conn| {
            let Some(asset) = find_live_by_location(conn, bucket, key)? else {
                return Ok(None);
            };
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE media_assets
                 SET tombstone = 1, current_version_id = NULL, status = ?, updated_at = ?
                 WHERE asset_id = ?",
                params![AssetStatus::Deleted.as_str(), now, asset.asset_id],
            )?;
            conn.execute(
                "UPDATE transcript_segments SET visibility = ? WHERE asset_id = ?",
                params![PublishState::SoftDeleted.as_str(), asset.asset_id],
            )?;
            conn.execute(
                "UPDATE transcript_embeddings SET visibility = ? WHERE asset_id = ?",
                params![PublishState::SoftDeleted.as_str(), asset.asset_id],
            )?;
            info!(asset_id = %asset.asset_id, bucket, key, "asset tombstoned");
            Ok(Some(asset.asset_id))
        })
    }

    pub(crate) fn get_asset_sync(&self, asset_id: &str) -> Result<Option<Asset>, PipelineError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM media_assets WHERE asset_id = ?",
            params![asset_id],
            row_to_asset,
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn update_asset_status_sync(
        &self,
        asset_id: &str,
        status: AssetStatus,
    ) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE media_assets SET status = ?, updated_at = ? WHERE asset_id = ?",
            params![status.as_str(), Utc::now().to_rfc3339(), asset_id],
        )?;
        if changed == 0 {
            return Err(PipelineError::NotFound(format!("asset {asset_id}")));
        }
        Ok(())
    }

    pub(crate) fn update_asset_media_info_sync(
        &self,
        asset_id: &str,
        duration_ms: Option<i64>,
        codec_info: Option<&str>,
    ) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE media_assets
             SET duration_ms = COALESCE(?, duration_ms),
                 codec_info = COALESCE(?, codec_info),
                 updated_at = ?
             WHERE asset_id = ?",
            params![duration_ms, codec_info, Utc::now().to_rfc3339(), asset_id],
        )?;
        Ok(())
    }

    pub(crate) fn mark_retry_pending_sync(
        &self,
        asset_id: &str,
        last_error: &str,
        attempt: u32,
    ) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE media_assets
             SET status = ?, last_error = ?, attempt = ?, updated_at = ?
             WHERE asset_id = ?",
            params![
                AssetStatus::PendingRetry.as_str(),
                last_error,
                attempt as i64,
                Utc::now().to_rfc3339(),
                asset_id,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn quarantine_asset_sync(
        &self,
        asset_id: &str,
        triage_state: TriageState,
        recommended_action: &str,
        last_error: &str,
        attempt: u32,
    ) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE media_assets
             SET status = ?, triage_state = ?, recommended_action = ?,
                 last_error = ?, attempt = ?, updated_at = ?
             WHERE asset_id = ?",
            params![
                AssetStatus::Quarantined.as_str(),
                triage_state.as_str(),
                recommended_action,
                last_error,
                attempt as i64,
                Utc::now().to_rfc3339(),
                asset_id,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn clear_triage_sync(&self, asset_id: &str) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE media_assets
             SET status = ?, triage_state = NULL, recommended_action = NULL,
                 last_error = NULL, updated_at = ?
             WHERE asset_id = ?",
            params![
                AssetStatus::PendingRetry.as_str(),
                Utc::now().to_rfc3339(),
                asset_id,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn mark_failed_sync(&self, asset_id: &str) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE media_assets
             SET status = ?, triage_state = NULL, recommended_action = NULL, updated_at = ?
             WHERE asset_id = ?",
            params![AssetStatus::Failed.as_str(), Utc::now().to_rfc3339(), asset_id],
        )?;
        Ok(())
    }

    pub(crate) fn list_quarantined_sync(&self) -> Result<Vec<Asset>, PipelineError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM media_assets
             WHERE status = ? AND tombstone = 0
             ORDER BY updated_at DESC",
        )?;
        let assets = stmt
            .query_map(params![AssetStatus::Quarantined.as_str()], row_to_asset)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assets)
    }
}
