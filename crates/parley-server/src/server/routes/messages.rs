//! Message history API Route
//!
//! - GET /api/messages/:user1/:user2 - Messages between two users, oldest first

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use parley_chat::Message;
use serde::Serialize;
use tracing::{debug, instrument};

use super::ApiError;
use crate::server::AppState;

/// Create the messages router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/messages/:user1/:user2", get(history_handler))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub messages: Vec<Message>,
}

/// GET /api/messages/:user1/:user2
#[instrument(skip(state))]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path((user1, user2)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state.store().messages_between(&user1, &user2).await?;
    debug!(count = messages.len(), "Loaded message history");

    Ok(Json(HistoryResponse {
        success: true,
        messages,
    }))
}
