//! Audio format validation
//!
//! Classifies filename extensions against the closed set of formats the
//! browser playback engine can decode, and maps them to content types.

use std::path::Path;

/// Content type returned for anything outside the supported set
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
}

impl AudioFormat {
    /// Parse an extension (case-insensitive, no leading dot)
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    /// Canonical lower-case extension
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Ogg => "audio/ogg",
        }
    }
}

/// True iff `extension` names a supported format
pub fn is_supported(extension: &str) -> bool {
    AudioFormat::from_extension(extension).is_some()
}

/// Content type for `extension`, falling back to a generic binary type
pub fn content_type_for(extension: &str) -> &'static str {
    AudioFormat::from_extension(extension)
        .map(|format| format.content_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Extension of a plain filename, without the dot
pub fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|ext| ext.to_str())
}

/// Dotfiles are never catalogued
pub fn is_hidden(filename: &str) -> bool {
    filename.starts_with('.')
}

/// Filename is a visible file with a supported extension
pub fn is_candidate(filename: &str) -> bool {
    !is_hidden(filename) && extension_of(filename).is_some_and(is_supported)
}
