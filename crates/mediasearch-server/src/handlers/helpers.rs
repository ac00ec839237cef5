//! Shared handler helpers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mediasearch::PipelineError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

pub fn not_found(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Map a pipeline error onto an HTTP response. Invalid input is the
/// caller's fault; everything else from a read path is a 5xx.
pub fn pipeline_error(e: PipelineError) -> Response {
    match &e {
        PipelineError::InvalidInput(message) => bad_request(message.clone()),
        PipelineError::NotFound(message) => not_found(message.clone()),
        _ => {
            error!(error = %e, "handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "internal error".to_string(),
                }),
            )
                .into_response()
        }
    }
}
