//! Server-Sent Events for registry changes

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /api/events
///
/// Streams `fileChange` and `refresh` events. Polling `/api/audio` remains
/// equally valid; nothing depends on a subscriber being attached.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    soundboard_common::sse::create_event_sse_stream(state.registry.events(), "soundboard-server")
}
