//! API routes module

pub mod auth;
pub mod projects;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Project registry routes
        .nest("/projects", projects::router())
        // Login
        .nest("/auth", auth::router())
}
