//! Audio byte streaming
//!
//! Serves a cataloged file with single-range `Range: bytes=` support so the
//! browser can seek and replay pads without refetching the whole file.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::services::format_validator;
use crate::AppState;

/// Inclusive byte range within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a single `bytes=start-end`, `bytes=start-` or `bytes=-suffix` range
///
/// An end past the file is clamped to the last byte. Returns `None` for
/// anything malformed, multi-range, or not satisfiable within `file_size`.
pub fn parse_range_header(value: &str, file_size: u64) -> Option<ByteRange> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    let (first, last) = ranges.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    if file_size == 0 || last.contains('-') || last.contains(',') {
        return None;
    }

    let last_byte = file_size - 1;

    let (start, end) = if first.is_empty() {
        let suffix: u64 = last.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        (file_size.saturating_sub(suffix), last_byte)
    } else {
        let start: u64 = first.parse().ok()?;
        let end = if last.is_empty() {
            last_byte
        } else {
            last.parse::<u64>().ok()?.min(last_byte)
        };
        (start, end)
    };

    (start <= end && start < file_size).then_some(ByteRange { start, end })
}

/// GET /audio/:filename
pub async fn stream_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let entry = state
        .registry
        .get_by_filename(&filename)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("audio file {}", filename)))?;

    let mut file = tokio::fs::File::open(&entry.path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound(format!("audio file {}", filename))
        } else {
            ApiError::Internal(format!("Failed to open {}: {}", filename, e))
        }
    })?;

    // The file may have changed since it was cataloged
    let file_size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to stat {}: {}", filename, e)))?
        .len();

    let content_type = HeaderValue::from_str(&entry.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(format_validator::FALLBACK_CONTENT_TYPE));

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match headers.get(header::RANGE) {
        Some(raw) => {
            let range = raw
                .to_str()
                .ok()
                .and_then(|value| parse_range_header(value, file_size))
                .ok_or(ApiError::RangeNotSatisfiable { length: file_size })?;

            debug!(file = %filename, start = range.start, end = range.end, "Serving byte range");

            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to seek {}: {}", filename, e)))?;

            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", range.start, range.end, file_size),
                )
                .header(header::CONTENT_LENGTH, range.len())
                .body(Body::from_stream(ReaderStream::new(file.take(range.len()))))
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, file_size)
            .body(Body::from_stream(ReaderStream::new(file))),
    };

    response.map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

/// Build streaming routes
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/audio/:filename", get(stream_audio))
}
