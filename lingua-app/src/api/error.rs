//! Error responses for the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lingua_core::CoreError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing x-user-id header")]
    Unauthenticated,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Core(e) => match e {
                CoreError::InvalidGrade(_) => (StatusCode::BAD_REQUEST, "invalid_grade"),
                CoreError::InvalidDuration(_) => (StatusCode::BAD_REQUEST, "invalid_duration"),
                CoreError::Invalid(_) => (StatusCode::BAD_REQUEST, "bad_request"),
                CoreError::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "already_exists"),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                CoreError::Storage(_) => {
                    tracing::error!(error = %e, "storage error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
                }
            },
        };

        let details = match &self {
            ApiError::Core(CoreError::Storage(_)) => None,
            other => Some(other.to_string()),
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
