//! Catalog data model
//!
//! A `CatalogEntry` is one playable audio file as exposed to HTTP clients and
//! event subscribers. Entries are plain values: the registry hands out
//! clones, never references into its own state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata record for a single audio file in the watched directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Opaque identifier, unique within a catalog snapshot
    pub id: String,
    /// Name of the file on disk
    pub filename: String,
    /// Human-friendly pad label derived from the filename
    pub display_name: String,
    /// Lower-cased format tag (`wav`, `mp3`, `ogg`)
    pub extension: String,
    /// File size in bytes
    pub size: u64,
    /// Absolute location of the file
    pub path: PathBuf,
    /// MIME type used when streaming the file
    pub content_type: String,
    /// Filesystem creation time (falls back to modification time)
    pub created_at: DateTime<Utc>,
    /// Filesystem modification time
    pub modified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CatalogEntry {
        let now = Utc::now();
        CatalogEntry {
            id: "abc-1".to_string(),
            filename: "kick_drum.wav".to_string(),
            display_name: "Kick Drum".to_string(),
            extension: "wav".to_string(),
            size: 1000,
            path: PathBuf::from("/sounds/kick_drum.wav"),
            content_type: "audio/wav".to_string(),
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["displayName"], "Kick Drum");
        assert_eq!(json["contentType"], "audio/wav");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("modifiedAt").is_some());
        assert!(json.get("display_name").is_none());
    }
}
