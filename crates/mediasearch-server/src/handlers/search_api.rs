//! Search API endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use mediasearch::search::{SearchMode, SearchRequest, DEFAULT_LIMIT};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::super::AppState;
use super::helpers::{bad_request, pipeline_error};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SearchQueryParams {
    /// Search query text
    pub q: String,
    /// Search mode: keyword | semantic | hybrid (default keyword)
    #[serde(rename = "type")]
    pub mode: Option<String>,
    /// Restrict to a bucket
    pub bucket: Option<String>,
    /// Restrict to a speaker label
    pub speaker: Option<String>,
    /// Page size (1..100, default 20)
    pub limit: Option<usize>,
    /// Offset into the result set (default 0)
    pub offset: Option<usize>,
}

/// Search transcript segments.
///
/// Only ACTIVE segments of each asset's current version are searchable;
/// archived, staged, and soft-deleted transcripts never match.
#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQueryParams),
    responses(
        (status = 200, description = "Search results"),
        (status = 400, description = "Missing or invalid query parameters")
    ),
    tag = "Search"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> impl IntoResponse {
    let mode = match params.mode.as_deref() {
        None => SearchMode::Keyword,
        Some(raw) => match SearchMode::from_str(raw) {
            Some(mode) => mode,
            None => {
                return bad_request(format!(
                    "unknown search type `{raw}` (expected keyword, semantic, or hybrid)"
                ))
            }
        },
    };

    let request = SearchRequest {
        query: params.q,
        mode,
        bucket: params.bucket,
        speaker: params.speaker,
        limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        offset: params.offset.unwrap_or(0),
    };

    match state.search.search(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => pipeline_error(e),
    }
}
