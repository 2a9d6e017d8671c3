//! Audio catalog endpoints
//!
//! Thin handlers over `AudioRegistry`. Every response carries `success` and,
//! where the registry result is a list, the entries plus a count.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use soundboard_common::CatalogEntry;
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// List-shaped response (`list`, `refresh`)
#[derive(Debug, Serialize)]
pub struct EntryListResponse {
    pub success: bool,
    pub data: Vec<CatalogEntry>,
    pub count: usize,
    pub message: String,
}

impl EntryListResponse {
    fn new(data: Vec<CatalogEntry>, message: impl FnOnce(usize) -> String) -> Self {
        let count = data.len();
        Self {
            success: true,
            data,
            count,
            message: message(count),
        }
    }
}

/// Single-entry response
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub success: bool,
    pub data: CatalogEntry,
}

/// Aggregate over the current catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStats {
    pub total_files: usize,
    pub total_size: u64,
    /// extension -> number of files
    pub formats: BTreeMap<String, usize>,
    /// Mean size in bytes, rounded down (0 for an empty catalog)
    pub average_size: u64,
}

impl AudioStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let mut total_files = 0usize;
        let mut total_size = 0u64;
        let mut formats = BTreeMap::new();

        for entry in entries {
            total_files += 1;
            total_size += entry.size;
            *formats.entry(entry.extension.clone()).or_insert(0) += 1;
        }

        let average_size = if total_files == 0 {
            0
        } else {
            total_size / total_files as u64
        };

        Self {
            total_files,
            total_size,
            formats,
            average_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: AudioStats,
}

/// GET /api/audio
pub async fn list_audio(State(state): State<AppState>) -> Json<EntryListResponse> {
    // One snapshot so `data` and `count` always agree
    let snapshot = state.registry.snapshot().await;
    let entries = snapshot.entries().cloned().collect();

    Json(EntryListResponse::new(entries, |count| {
        format!("Found {} audio files", count)
    }))
}

/// GET /api/audio/:id
pub async fn get_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EntryResponse>> {
    let entry = state
        .registry
        .get_by_id(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("audio file {}", id)))?;

    Ok(Json(EntryResponse {
        success: true,
        data: entry,
    }))
}

/// POST /api/audio/refresh
pub async fn refresh_audio(State(state): State<AppState>) -> ApiResult<Json<EntryListResponse>> {
    let entries = state.registry.refresh().await?;

    Ok(Json(EntryListResponse::new(entries, |count| {
        format!("Refreshed catalog, {} audio files", count)
    })))
}

/// GET /api/audio/stats
pub async fn audio_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot = state.registry.snapshot().await;

    Json(StatsResponse {
        success: true,
        stats: AudioStats::from_entries(snapshot.entries()),
    })
}

/// Build audio catalog routes
pub fn audio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/audio", get(list_audio))
        .route("/api/audio/stats", get(audio_stats))
        .route("/api/audio/refresh", post(refresh_audio))
        .route("/api/audio/:id", get(get_audio))
}
