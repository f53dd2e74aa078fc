//! Errors surfaced by the inbound API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Everything a solve request can fail with before or outside the chain.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The request's secret does not match the configured one.
    #[error("invalid secret")]
    Unauthorized,

    /// The body is missing or is not `{email, secret, url}`.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Anything fatal for the whole request, e.g. no browser context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::Unauthorized => "invalid secret".to_string(),
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::Internal(e) => {
                // The cause stays server-side.
                error!(error = %format!("{e:#}"), "unhandled solve failure");
                "internal_error".to_string()
            }
        };
        (self.status(), Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
