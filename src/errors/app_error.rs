use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::core::RouterError;

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced to HTTP callers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RouterError> for AppError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::InvalidRequest(message) => Self::BadRequest(message),
            RouterError::BackendUnavailable(e) => {
                Self::ServiceUnavailable(format!("No synthesis backend available: {e}"))
            }
            RouterError::Synthesis(e) => Self::Internal(format!("Failed to generate audio: {e}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {self}");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
