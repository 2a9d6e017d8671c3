//! # Soundboard Common Library
//!
//! Shared code for the soundboard service and its tooling:
//! - Catalog entry model exposed over HTTP
//! - Registry event types and the broadcast `EventBus`
//! - Configuration loading (TOML bootstrap, environment, compiled defaults)
//! - Server-Sent Events helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
pub use models::CatalogEntry;
