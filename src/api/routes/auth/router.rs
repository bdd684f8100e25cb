//! Router for the auth API

use std::sync::{Arc, RwLock};

use axum::{Json, Router, extract::State, routing::post};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::auth::{AuthResponse, login};

type SharedState = Arc<RwLock<AppState>>;

async fn auth_login(
    State(state): State<SharedState>,
    Json(body): Json<public::LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (provider, sessions) = {
        let shared_state = state.read().unwrap_or_else(|e| e.into_inner());
        (
            Arc::clone(&shared_state.auth),
            Arc::clone(&shared_state.sessions),
        )
    };
    let resp = login(
        provider.as_ref(),
        sessions.as_ref(),
        &body.username,
        &body.access_key,
    )
    .await?;
    Ok(Json(resp))
}

/// Create the auth router
pub fn router() -> Router<SharedState> {
    Router::new().route("/login", post(auth_login))
}
