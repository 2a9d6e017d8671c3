//! Catalog entry construction
//!
//! Turns a filename inside the watched directory into a fully populated
//! `CatalogEntry`, or a structured `BuildFailure` the caller can classify.
//! Building is read-only: one `stat` per file, bounded by a timeout.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use soundboard_common::CatalogEntry;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use super::format_validator::{self, AudioFormat};

/// Why a file could not be turned into a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildFailureKind {
    /// Name is empty or would escape the watched directory
    #[error("invalid file name")]
    InvalidName,

    /// Directory, socket, or a symlink that does not resolve to a file
    #[error("not a regular file")]
    NotAFile,

    /// Extension outside the supported format set
    #[error("unsupported format")]
    Unsupported,

    /// Zero-byte file
    #[error("file is empty")]
    Empty,

    /// File exceeds the configured maximum
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// `stat` failed
    #[error("stat failed: {0}")]
    Stat(String),

    /// `stat` did not complete within the build timeout
    #[error("metadata build timed out")]
    Timeout,
}

/// Failed build for one file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{filename}: {kind}")]
pub struct BuildFailure {
    pub filename: String,
    pub kind: BuildFailureKind,
}

impl BuildFailure {
    fn new(filename: &str, kind: BuildFailureKind) -> Self {
        Self {
            filename: filename.to_string(),
            kind,
        }
    }

    /// Failures that are a normal part of scanning and are not worth a warning
    pub fn is_silent(&self) -> bool {
        matches!(
            self.kind,
            BuildFailureKind::NotAFile | BuildFailureKind::Unsupported
        )
    }
}

/// Builds catalog entries for files in a single directory
///
/// Every build mints a fresh id: a digest of the filename plus a
/// builder-wide revision number. Ids are therefore unique within any
/// snapshot and change whenever a file is rebuilt.
#[derive(Debug)]
pub struct MetadataBuilder {
    max_file_size: u64,
    timeout: Duration,
    revision: AtomicU64,
}

impl MetadataBuilder {
    pub fn new(max_file_size: u64, timeout: Duration) -> Self {
        Self {
            max_file_size,
            timeout,
            revision: AtomicU64::new(0),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Build an entry for `filename` inside `directory`
    ///
    /// `directory` is expected to be absolute; the entry's `path` is
    /// `directory.join(filename)`.
    pub async fn build(
        &self,
        directory: &Path,
        filename: &str,
    ) -> Result<CatalogEntry, BuildFailure> {
        if !is_plain_name(filename) {
            return Err(BuildFailure::new(filename, BuildFailureKind::InvalidName));
        }

        let format = format_validator::extension_of(filename)
            .and_then(AudioFormat::from_extension)
            .ok_or_else(|| BuildFailure::new(filename, BuildFailureKind::Unsupported))?;

        let path = directory.join(filename);

        let stat = async {
            match tokio::fs::metadata(&path).await {
                Ok(metadata) => Ok(metadata),
                // A dangling symlink stats as missing while the link itself exists
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    match tokio::fs::symlink_metadata(&path).await {
                        Ok(link) if link.file_type().is_symlink() => {
                            Err(BuildFailureKind::NotAFile)
                        }
                        _ => Err(BuildFailureKind::Stat(e.to_string())),
                    }
                }
                Err(e) => Err(BuildFailureKind::Stat(e.to_string())),
            }
        };

        let metadata = match tokio::time::timeout(self.timeout, stat).await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(kind)) => return Err(BuildFailure::new(filename, kind)),
            Err(_) => return Err(BuildFailure::new(filename, BuildFailureKind::Timeout)),
        };

        if !metadata.is_file() {
            return Err(BuildFailure::new(filename, BuildFailureKind::NotAFile));
        }

        let size = metadata.len();
        if size == 0 {
            return Err(BuildFailure::new(filename, BuildFailureKind::Empty));
        }
        if size > self.max_file_size {
            return Err(BuildFailure::new(
                filename,
                BuildFailureKind::TooLarge {
                    size,
                    max: self.max_file_size,
                },
            ));
        }

        let modified_at: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        // Not every filesystem records birth time
        let created_at: DateTime<Utc> = metadata
            .created()
            .map(DateTime::from)
            .unwrap_or(modified_at);

        Ok(CatalogEntry {
            id: self.mint_id(filename),
            filename: filename.to_string(),
            display_name: display_name(filename),
            extension: format.extension().to_string(),
            size,
            path,
            content_type: format.content_type().to_string(),
            created_at,
            modified_at,
        })
    }

    fn mint_id(&self, filename: &str) -> String {
        let revision = self.revision.fetch_add(1, Ordering::Relaxed) + 1;
        let digest = format!("{:x}", Sha256::digest(filename.as_bytes()));
        format!("{}-{:x}", &digest[..16], revision)
    }
}

/// A single normal path component: no separators, `.`/`..` or roots
fn is_plain_name(filename: &str) -> bool {
    if filename.is_empty() || filename.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Pad label: extension dropped, `_`/`-` become spaces, words capitalized
///
/// `kick_drum-01.wav` becomes `Kick Drum 01`.
pub fn display_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let label = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    if label.is_empty() {
        filename.to_string()
    } else {
        label
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MAX: u64 = 1024;

    fn builder() -> MetadataBuilder {
        MetadataBuilder::new(MAX, Duration::from_secs(5))
    }

    fn write_bytes(dir: &Path, name: &str, len: usize) {
        fs::write(dir.join(name), vec![0u8; len]).unwrap();
    }

    #[tokio::test]
    async fn test_build_populates_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_bytes(temp_dir.path(), "kick_drum.WAV", 1000);

        let entry = builder().build(temp_dir.path(), "kick_drum.WAV").await.unwrap();
        assert_eq!(entry.filename, "kick_drum.WAV");
        assert_eq!(entry.display_name, "Kick Drum");
        assert_eq!(entry.extension, "wav");
        assert_eq!(entry.content_type, "audio/wav");
        assert_eq!(entry.size, 1000);
        assert_eq!(entry.path, temp_dir.path().join("kick_drum.WAV"));
        assert!(entry.created_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_size_boundaries() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_bytes(temp_dir.path(), "exact.mp3", MAX as usize);
        write_bytes(temp_dir.path(), "over.mp3", MAX as usize + 1);
        write_bytes(temp_dir.path(), "empty.mp3", 0);

        let builder = builder();
        assert!(builder.build(temp_dir.path(), "exact.mp3").await.is_ok());

        let over = builder.build(temp_dir.path(), "over.mp3").await.unwrap_err();
        assert_eq!(
            over.kind,
            BuildFailureKind::TooLarge {
                size: MAX + 1,
                max: MAX
            }
        );

        let empty = builder.build(temp_dir.path(), "empty.mp3").await.unwrap_err();
        assert_eq!(empty.kind, BuildFailureKind::Empty);
        assert!(!empty.is_silent());
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir(temp_dir.path().join("folder.ogg")).unwrap();

        let failure = builder().build(temp_dir.path(), "folder.ogg").await.unwrap_err();
        assert_eq!(failure.kind, BuildFailureKind::NotAFile);
        assert!(failure.is_silent());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_not_a_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("nowhere.wav"),
            temp_dir.path().join("dangling.wav"),
        )
        .unwrap();

        let failure = builder().build(temp_dir.path(), "dangling.wav").await.unwrap_err();
        assert_eq!(failure.kind, BuildFailureKind::NotAFile);
        assert!(failure.is_silent());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_loop_is_stat_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (a, b) = (temp_dir.path().join("loop_a.wav"), temp_dir.path().join("loop_b.wav"));
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();

        let failure = builder().build(temp_dir.path(), "loop_a.wav").await.unwrap_err();
        assert!(matches!(failure.kind, BuildFailureKind::Stat(_)));
        assert!(!failure.is_silent());
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_unsupported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let builder = builder();

        for name in ["../escape.wav", "sub/inner.wav", "..", "", "/etc/passwd.wav"] {
            let failure = builder.build(temp_dir.path(), name).await.unwrap_err();
            assert_eq!(failure.kind, BuildFailureKind::InvalidName, "name: {name:?}");
        }

        write_bytes(temp_dir.path(), "notes.txt", 10);
        let failure = builder.build(temp_dir.path(), "notes.txt").await.unwrap_err();
        assert_eq!(failure.kind, BuildFailureKind::Unsupported);
    }

    #[tokio::test]
    async fn test_missing_file_is_stat_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let failure = builder().build(temp_dir.path(), "ghost.wav").await.unwrap_err();
        assert!(matches!(failure.kind, BuildFailureKind::Stat(_)));
        assert_eq!(failure.filename, "ghost.wav");
    }

    #[tokio::test]
    async fn test_rebuild_mints_new_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_bytes(temp_dir.path(), "a.wav", 10);
        write_bytes(temp_dir.path(), "b.wav", 10);

        let builder = builder();
        let first = builder.build(temp_dir.path(), "a.wav").await.unwrap();
        let second = builder.build(temp_dir.path(), "a.wav").await.unwrap();
        let other = builder.build(temp_dir.path(), "b.wav").await.unwrap();

        assert_ne!(first.id, second.id);
        // Same filename digest prefix
        assert_eq!(first.id.split('-').next(), second.id.split('-').next());
        assert_ne!(first.id.split('-').next(), other.id.split('-').next());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("kick_drum-01.wav"), "Kick Drum 01");
        assert_eq!(display_name("air  horn.mp3"), "Air Horn");
        assert_eq!(display_name("already Fine.ogg"), "Already Fine");
        assert_eq!(display_name("___.wav"), "___.wav");
    }
}
