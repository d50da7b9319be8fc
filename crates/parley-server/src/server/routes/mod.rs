// Route modules for Parley Server API
pub mod auth; // Login (find-or-create identity)
pub mod conversations; // Conversation summaries
pub mod messages; // Message history
pub mod users; // Identity search
pub mod websocket; // Real-time chat events

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_chat::{ChatError, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Error response envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Errors returned by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Chat(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Store(_) | ApiError::Chat(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Rejected request");
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
