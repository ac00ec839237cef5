//! Asset detail and version history.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use mediasearch::models::{Asset, AssetVersion};
use serde::Serialize;
use utoipa::ToSchema;

use super::super::AppState;
use super::helpers::{not_found, pipeline_error};

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetResponse {
    pub asset_id: String,
    pub lineage_id: String,
    pub bucket: String,
    pub object_key: String,
    pub current_version_id: Option<String>,
    pub status: String,
    pub engine: String,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub duration_ms: Option<i64>,
    pub tombstone: bool,
    pub ingest_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Asset> for AssetResponse {
    fn from(asset: Asset) -> Self {
        Self {
            asset_id: asset.asset_id,
            lineage_id: asset.lineage_id,
            bucket: asset.bucket,
            object_key: asset.object_key,
            current_version_id: asset.current_version_id,
            status: asset.status.as_str().to_string(),
            engine: asset.engine,
            file_size: asset.file_size,
            content_type: asset.content_type,
            duration_ms: asset.duration_ms,
            tombstone: asset.tombstone,
            ingest_time: asset.ingest_time,
            updated_at: asset.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    pub version_id: String,
    pub status: String,
    pub publish_state: String,
    pub etag: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl From<AssetVersion> for VersionResponse {
    fn from(version: AssetVersion) -> Self {
        Self {
            version_id: version.version_id,
            status: version.status.as_str().to_string(),
            publish_state: version.publish_state.as_str().to_string(),
            etag: version.etag,
            file_size: version.file_size,
            created_at: version.created_at,
        }
    }
}

/// Fetch one asset by id.
#[utoipa::path(
    get,
    path = "/api/assets/{asset_id}",
    params(("asset_id" = String, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset detail", body = AssetResponse),
        (status = 404, description = "Unknown asset")
    ),
    tag = "Assets"
)]
pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> impl IntoResponse {
    match state.db.get_asset(&asset_id).await {
        Ok(Some(asset)) => Json(AssetResponse::from(asset)).into_response(),
        Ok(None) => not_found(format!("asset {asset_id}")),
        Err(e) => pipeline_error(e),
    }
}

/// Version history for an asset, newest first.
#[utoipa::path(
    get,
    path = "/api/assets/{asset_id}/versions",
    params(("asset_id" = String, Path, description = "Asset id")),
    responses((status = 200, description = "Versions", body = [VersionResponse])),
    tag = "Assets"
)]
pub async fn list_asset_versions(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> impl IntoResponse {
    match state.db.list_versions(&asset_id).await {
        Ok(versions) => {
            let out: Vec<VersionResponse> =
                versions.into_iter().map(VersionResponse::from).collect();
            Json(out).into_response()
        }
        Err(e) => pipeline_error(e),
    }
}
