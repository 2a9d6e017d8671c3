//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::services::change_watcher::WatcherStatus;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` when live updates are expected but not flowing
    pub status: String,
    pub module: String,
    pub version: String,
    pub watcher: WatcherStatus,
    pub files: usize,
    pub uptime_seconds: i64,
}

/// GET /health
///
/// The catalog stays servable while degraded; only live sync is lost.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let watcher = state.registry.watcher_status();
    let degraded = state.registry.config().watch && watcher != WatcherStatus::Watching;

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        module: "soundboard-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        watcher,
        files: state.registry.count().await,
        uptime_seconds: (Utc::now() - state.startup_time).num_seconds(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
