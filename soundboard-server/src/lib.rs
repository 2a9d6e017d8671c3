//! soundboard-server library
//!
//! Live registry of the audio files in one directory, served over HTTP to a
//! browser soundboard. Exposed as a library for integration testing.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::AudioRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The single registry instance owned by `main`
    pub registry: Arc<AudioRegistry>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Static frontend served at `/`, if configured
    pub public_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(registry: Arc<AudioRegistry>) -> Self {
        Self {
            registry,
            startup_time: Utc::now(),
            public_dir: None,
        }
    }

    pub fn with_public_dir(mut self, public_dir: Option<PathBuf>) -> Self {
        self.public_dir = public_dir;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let public_dir = state.public_dir.clone();

    let router = Router::new()
        .merge(api::audio_routes())
        .merge(api::stream_routes())
        .route("/api/events", get(api::event_stream))
        .merge(api::health_routes())
        .with_state(state);

    let router = match public_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
