//! Router configuration.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check for container orchestration
        .route("/health", get(handlers::health))
        // Search API
        .route("/api/search", get(handlers::search))
        // Triage API - quarantined assets and operator actions
        .route("/api/triage", get(handlers::list_triage))
        .route("/api/triage/:asset_id/retry", post(handlers::triage_retry))
        .route("/api/triage/:asset_id/skip", post(handlers::triage_skip))
        // Assets API - asset detail and version history
        .route("/api/assets/:asset_id", get(handlers::get_asset))
        .route(
            "/api/assets/:asset_id/versions",
            get(handlers::list_asset_versions),
        )
        // OpenAPI spec
        .route("/api/openapi.json", get(handlers::openapi_spec))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
