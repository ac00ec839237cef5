//! HTTP handlers.

mod assets_api;
mod helpers;
mod search_api;
mod triage_api;

pub use assets_api::{get_asset, list_asset_versions};
pub use search_api::search;
pub use triage_api::{list_triage, triage_retry, triage_skip};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use utoipa::OpenApi;

use super::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        search_api::search,
        triage_api::list_triage,
        triage_api::triage_retry,
        triage_api::triage_skip,
        assets_api::get_asset,
        assets_api::list_asset_versions,
    ),
    components(schemas(
        search_api::SearchQueryParams,
        triage_api::TriageEntry,
        assets_api::AssetResponse,
        assets_api::VersionResponse,
    )),
    info(
        title = "MediaSearch API",
        description = "Keyword, semantic, and hybrid search over media transcripts"
    )
)]
struct ApiDoc;

/// Liveness plus a database reachability probe.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.list_quarantined().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({"status": "healthy"})),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "unhealthy", "error": e.to_string()})),
        ),
    }
}

pub async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
