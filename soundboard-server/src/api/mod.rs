//! HTTP API handlers

pub mod audio;
pub mod health;
pub mod sse;
pub mod stream;

pub use audio::audio_routes;
pub use health::health_routes;
pub use sse::event_stream;
pub use stream::stream_routes;
