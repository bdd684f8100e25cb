//! Test utilities for integration tests
#![allow(dead_code)]
use std::fs;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};
use tempfile::TempDir;

use codevault::ai::scripted::ScriptedGateway;
use codevault::api::AppState;
use codevault::api::app;
use codevault::core::AppConfig;
use codevault::core::db::async_db;

/// A router over a fresh on-disk database with the AI backend
/// replaced by `gateway`. Keep the returned `TempDir` alive for as
/// long as the router is used.
pub async fn test_app_with(gateway: ScriptedGateway) -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage_path = dir.path().to_str().unwrap();

    let mut app_config = AppConfig::with_storage_path(storage_path);
    app_config.public_origin = String::from("http://localhost:2222");
    app_config.analysis_step_delay = Duration::ZERO;
    fs::create_dir_all(&app_config.downloads_path).expect("Failed to create downloads directory");
    fs::write(
        format!("{}/todo-cli.zip", app_config.downloads_path),
        b"not really a zip",
    )
    .unwrap();

    let db = async_db(&app_config.db_path)
        .await
        .expect("Failed to connect to async db");

    let app_state = AppState::new(db, app_config).with_ai(Arc::new(gateway));
    (app(Arc::new(RwLock::new(app_state))), dir)
}

pub async fn test_app() -> (Router, TempDir) {
    test_app_with(ScriptedGateway::new()).await
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf8")
}
