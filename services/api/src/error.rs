//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use social::SocialError;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Domain operation failed
    #[error(transparent)]
    Social(#[from] SocialError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Social(err) => match err {
                SocialError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
                SocialError::AlreadyPending
                | SocialError::AlreadyConnected
                | SocialError::Conflict(_)
                | SocialError::UsernameTaken(_) => (StatusCode::CONFLICT, err.to_string()),
                SocialError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
                SocialError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                SocialError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                ),
                SocialError::Media(_) => {
                    (StatusCode::BAD_GATEWAY, "Media storage error".to_string())
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
