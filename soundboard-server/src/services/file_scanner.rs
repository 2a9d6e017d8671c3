//! Audio directory scanner
//!
//! Lists the watched directory, filters out hidden files and unsupported
//! formats, then builds metadata for every remaining file concurrently.
//!
//! Per-file error isolation: every build is attempted and its outcome
//! collected. A failing file is logged and left out of the result; it never
//! aborts the rest of the scan. Only an unlistable directory fails the scan.

use futures::stream::{self, StreamExt};
use soundboard_common::CatalogEntry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::format_validator;
use super::metadata_builder::{BuildFailure, MetadataBuilder};

/// Number of metadata builds in flight during a scan
const DEFAULT_CONCURRENCY: usize = 8;

/// Audio file scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Directory is missing, unreadable or not a directory
    #[error("Cannot list directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a full directory scan
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Successfully built entries, in filename order
    pub entries: Vec<CatalogEntry>,
    /// Files that were candidates but failed to build (already logged)
    pub failures: Vec<BuildFailure>,
    /// Names skipped without a warning (hidden, unsupported, not a file)
    pub skipped: usize,
}

/// Audio file scanner
pub struct FileScanner {
    builder: Arc<MetadataBuilder>,
    concurrency: usize,
}

impl FileScanner {
    pub fn new(builder: Arc<MetadataBuilder>) -> Self {
        Self {
            builder,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit the number of concurrent metadata builds (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Scan `directory` and build an entry for every valid audio file
    pub async fn scan(&self, directory: &Path) -> Result<ScanReport, ScanError> {
        let read_error = |source| ScanError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        };

        let mut listing = tokio::fs::read_dir(directory).await.map_err(read_error)?;

        let mut report = ScanReport::default();
        let mut candidates = Vec::new();

        while let Some(dir_entry) = listing.next_entry().await.map_err(read_error)? {
            let filename = match dir_entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!("Skipping non UTF-8 file name {:?}", raw);
                    report.skipped += 1;
                    continue;
                }
            };

            if !format_validator::is_candidate(&filename) {
                trace!(file = %filename, "Skipping hidden or unsupported file");
                report.skipped += 1;
                continue;
            }

            candidates.push(filename);
        }

        let total_candidates = candidates.len();
        let builder = &self.builder;

        let results: Vec<Result<CatalogEntry, BuildFailure>> = stream::iter(candidates)
            .map(|filename| async move { builder.build(directory, &filename).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(entry) => report.entries.push(entry),
                Err(failure) if failure.is_silent() => {
                    debug!(file = %failure.filename, reason = %failure.kind, "Skipping file");
                    report.skipped += 1;
                }
                Err(failure) => {
                    warn!(
                        file = %failure.filename,
                        reason = %failure.kind,
                        "Failed to build audio file metadata"
                    );
                    report.failures.push(failure);
                }
            }
        }

        report.entries.sort_by(|a, b| a.filename.cmp(&b.filename));

        info!(
            directory = %directory.display(),
            candidates = total_candidates,
            loaded = report.entries.len(),
            failed = report.failures.len(),
            "Audio directory scan complete"
        );

        Ok(report)
    }
}
