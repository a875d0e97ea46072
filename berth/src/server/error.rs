//! API error mapping
//!
//! Validation, not-found and conflict details go back to the caller;
//! everything else is logged with context and collapses to a generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::errors::BerthError;

pub struct ApiError(pub BerthError);

impl From<BerthError> for ApiError {
    fn from(err: BerthError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            BerthError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            BerthError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            BerthError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
