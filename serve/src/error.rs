//! `{"error":{"code","message","details"?}}` error responses (spec §6/§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::store::StoreError;
use engine::ExecutorError;
use serde_json::{json, Value};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "config_error", message)
    }

    /// Maps a taxonomy tag (spec §7) to its HTTP status code.
    fn status_for_tag(tag: &str) -> StatusCode {
        match tag {
            "invalid_request" | "missing_profile_id" | "unknown_step" => StatusCode::BAD_REQUEST,
            "not_found" | "profile_not_found" | "kind_not_registered" => StatusCode::NOT_FOUND,
            "already_exists" => StatusCode::CONFLICT,
            "method_not_allowed" => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        ApiError::new(ApiError::status_for_tag(err.tag()), err.tag(), err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::new(ApiError::status_for_tag(err.tag()), err.tag(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
