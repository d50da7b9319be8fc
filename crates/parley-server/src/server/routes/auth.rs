//! Login API Route
//!
//! - POST /api/auth/login - Find or create an identity by username or email
//!
//! There are no credentials: any username/email pair is accepted.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::ApiError;
use crate::server::AppState;

/// Create the auth router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/login", post(login_handler))
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Public view of a logged-in user
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: LoginUser,
}

/// POST /api/auth/login
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = request.username.trim();
    let email = request.email.trim();
    if username.is_empty() || email.is_empty() {
        return Err(ApiError::InvalidInput(
            "username and email are required".to_string(),
        ));
    }

    let user = state.store().upsert_identity(username, email).await?;
    info!(id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        success: true,
        user: LoginUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    }))
}
