//! Conversation list API Route
//!
//! - GET /api/conversations/:username - Latest message per conversation partner

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use parley_chat::ConversationSummary;
use serde::Serialize;
use tracing::instrument;

use super::ApiError;
use crate::server::AppState;

/// Create the conversations router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/conversations/:username", get(conversations_handler))
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub success: bool,
    pub conversations: Vec<ConversationSummary>,
}

/// GET /api/conversations/:username
#[instrument(skip(state))]
pub async fn conversations_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let conversations = state.hub.summarizer().summarize(&username).await?;

    Ok(Json(ConversationsResponse {
        success: true,
        conversations,
    }))
}
