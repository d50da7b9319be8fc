//! User search API Route
//!
//! - GET /api/users/search?query= - Case-insensitive username substring search

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use parley_chat::UserRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::ApiError;
use crate::server::AppState;

/// Create the users router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/users/search", get(search_users_handler))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Missing query matches every user
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub users: Vec<UserRecord>,
}

/// GET /api/users/search
#[instrument(skip(state))]
pub async fn search_users_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let users = state.store().find_identities(&params.query).await?;
    debug!(count = users.len(), "User search");

    Ok(Json(SearchResponse {
        success: true,
        users,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::{body_json, create_test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn search(state: Arc<AppState>, uri: &str) -> serde_json::Value {
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let state = create_test_state();
        state.store().upsert_identity("Alice", "a@example.com").await.unwrap();
        state.store().upsert_identity("bob", "b@example.com").await.unwrap();

        let json = search(state, "/api/users/search?query=ali").await;

        assert_eq!(json["success"], true);
        let users = json["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "Alice");
        assert_eq!(users[0]["isOnline"], true);
        assert!(users[0]["lastSeen"].is_string());
    }

    #[tokio::test]
    async fn test_search_without_query_lists_everyone() {
        let state = create_test_state();
        state.store().upsert_identity("alice", "a@example.com").await.unwrap();
        state.store().upsert_identity("bob", "b@example.com").await.unwrap();

        let json = search(state, "/api/users/search").await;
        assert_eq!(json["users"].as_array().unwrap().len(), 2);
    }
}
