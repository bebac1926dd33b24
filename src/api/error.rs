//! Caller-facing error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::audit::HistoryError;
use crate::relay::RelayError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected before execution; nothing was recorded.
    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("{message}: {details}")]
    Internal { message: String, details: String },
}

impl ApiError {
    pub fn internal(message: &str, details: impl ToString) -> Self {
        Self::Internal {
            message: message.to_string(),
            details: details.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
            }
            Self::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message, "details": details })),
            )
                .into_response(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(v) => Self::BadRequest(v.to_string()),
            RelayError::Internal(details) => Self::internal("Internal server error", details),
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::NotFound(_) => Self::NotFound,
            HistoryError::Store(store) => Self::internal("Failed to fetch test", store),
        }
    }
}
