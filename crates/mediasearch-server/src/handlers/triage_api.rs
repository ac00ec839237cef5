//! Triage API: quarantined asset listing and operator actions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use mediasearch::models::Asset;
use serde::Serialize;
use utoipa::ToSchema;

use super::super::AppState;
use super::helpers::pipeline_error;

#[derive(Debug, Serialize, ToSchema)]
pub struct TriageEntry {
    pub asset_id: String,
    pub bucket: String,
    pub object_key: String,
    pub triage_state: Option<String>,
    pub recommended_action: Option<String>,
    pub last_error: Option<String>,
    pub attempt: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<Asset> for TriageEntry {
    fn from(asset: Asset) -> Self {
        Self {
            asset_id: asset.asset_id,
            bucket: asset.bucket,
            object_key: asset.object_key,
            triage_state: asset.triage_state.map(|t| t.as_str().to_string()),
            recommended_action: asset.recommended_action,
            last_error: asset.last_error,
            attempt: asset.attempt,
            updated_at: asset.updated_at,
        }
    }
}

/// List quarantined assets awaiting operator attention.
#[utoipa::path(
    get,
    path = "/api/triage",
    responses((status = 200, description = "Quarantined assets", body = [TriageEntry])),
    tag = "Triage"
)]
pub async fn list_triage(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.list_quarantined().await {
        Ok(assets) => {
            let entries: Vec<TriageEntry> = assets.into_iter().map(TriageEntry::from).collect();
            Json(entries).into_response()
        }
        Err(e) => pipeline_error(e),
    }
}

/// Re-run a quarantined asset with a fresh attempt budget.
#[utoipa::path(
    post,
    path = "/api/triage/{asset_id}/retry",
    params(("asset_id" = String, Path, description = "Asset to retry")),
    responses(
        (status = 202, description = "Retry scheduled"),
        (status = 404, description = "No DLQ entry for the asset")
    ),
    tag = "Triage"
)]
pub async fn triage_retry(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> impl IntoResponse {
    match state.retry.triage_retry(&asset_id).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "retry_scheduled", "asset_id": asset_id})),
        )
            .into_response(),
        Err(e) => pipeline_error(e),
    }
}

/// Mark a quarantined asset as terminally failed.
#[utoipa::path(
    post,
    path = "/api/triage/{asset_id}/skip",
    params(("asset_id" = String, Path, description = "Asset to skip")),
    responses((status = 200, description = "Asset marked failed")),
    tag = "Triage"
)]
pub async fn triage_skip(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> impl IntoResponse {
    match state.retry.triage_skip(&asset_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "skipped", "asset_id": asset_id})),
        )
            .into_response(),
        Err(e) => pipeline_error(e),
    }
}
