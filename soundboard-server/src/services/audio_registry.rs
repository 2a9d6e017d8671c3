//! Audio file registry
//!
//! Composes the scanner, change watcher and catalog store behind one handle
//! owned by the composition root and shared with HTTP handlers through
//! `AppState`. Reads never touch the disk; they are served from the current
//! catalog snapshot.

use chrono::Utc;
use soundboard_common::config::ServerConfig;
use soundboard_common::events::{EventBus, RegistryEvent};
use soundboard_common::CatalogEntry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

use super::catalog_store::{CatalogSnapshot, CatalogStore};
use super::change_watcher::{ChangeWatcher, WatcherStatus};
use super::file_scanner::{FileScanner, ScanError};
use super::metadata_builder::MetadataBuilder;

/// Capacity of the registry event channel
const EVENT_CAPACITY: usize = 256;

/// Registry lifecycle errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Watched directory could not be created or resolved
    #[error("Audio directory {path} unavailable: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory listing failed during a scan
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// `refresh()` called before `initialize()` or after `shutdown()`
    #[error("Audio registry is not initialized")]
    NotInitialized,
}

/// Registry settings
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory to catalog (created if missing)
    pub audio_dir: PathBuf,
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// Run the change watcher after the initial scan
    pub watch: bool,
    /// Upper bound for a single metadata build
    pub build_timeout: Duration,
}

impl From<&ServerConfig> for RegistryConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            audio_dir: config.audio_dir.clone(),
            max_file_size: config.max_file_size,
            watch: config.watch,
            build_timeout: Duration::from_millis(config.build_timeout_ms),
        }
    }
}

/// Live catalog of the audio files in one directory
pub struct AudioRegistry {
    config: RegistryConfig,
    builder: Arc<MetadataBuilder>,
    scanner: FileScanner,
    store: Arc<CatalogStore>,
    watcher: ChangeWatcher,
    events: EventBus,
    /// Canonical watched directory, set by `initialize()`
    directory: RwLock<Option<PathBuf>>,
}

impl AudioRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let builder = Arc::new(MetadataBuilder::new(
            config.max_file_size,
            config.build_timeout,
        ));

        Self {
            scanner: FileScanner::new(Arc::clone(&builder)),
            builder,
            store: Arc::new(CatalogStore::new()),
            watcher: ChangeWatcher::new(),
            events: EventBus::new(EVENT_CAPACITY),
            directory: RwLock::new(None),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create the directory if needed, load the initial catalog and start
    /// the watcher (when enabled)
    ///
    /// Watcher startup failure is logged and tolerated: the initial catalog
    /// is already committed and remains servable.
    pub async fn initialize(&self) -> Result<(), RegistryError> {
        let requested = &self.config.audio_dir;
        let unavailable = |source| RegistryError::DirectoryUnavailable {
            path: requested.clone(),
            source,
        };

        tokio::fs::create_dir_all(requested).await.map_err(unavailable)?;
        let directory = tokio::fs::canonicalize(requested).await.map_err(unavailable)?;

        let report = self.scanner.scan(&directory).await?;
        let loaded = report.entries.len();
        self.store.replace_all(report.entries).await;
        *self.directory.write().await = Some(directory.clone());

        info!(
            directory = %directory.display(),
            files = loaded,
            failed = report.failures.len(),
            "Audio registry initialized"
        );

        if self.config.watch {
            if let Err(e) = self
                .watcher
                .start(
                    directory,
                    Arc::clone(&self.builder),
                    Arc::clone(&self.store),
                    self.events.clone(),
                )
                .await
            {
                error!("File watcher failed to start, serving static catalog: {}", e);
            }
        } else {
            info!("File watcher disabled by configuration");
        }

        Ok(())
    }

    /// Every entry, in filename order
    pub async fn list(&self) -> Vec<CatalogEntry> {
        self.store.all().await
    }

    /// Consistent view for callers that need several reads to agree
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.store.snapshot().await
    }

    pub async fn get_by_id(&self, id: &str) -> Option<CatalogEntry> {
        self.store.get(id).await
    }

    pub async fn get_by_filename(&self, filename: &str) -> Option<CatalogEntry> {
        self.store.get_by_filename(filename).await
    }

    pub async fn count(&self) -> usize {
        self.store.count().await
    }

    /// Rescan the directory and replace the whole catalog
    ///
    /// Supersedes anything the watcher built incrementally. Emits a `refresh`
    /// event carrying the new entry set.
    pub async fn refresh(&self) -> Result<Vec<CatalogEntry>, RegistryError> {
        let directory = self
            .directory
            .read()
            .await
            .clone()
            .ok_or(RegistryError::NotInitialized)?;

        let report = self.scanner.scan(&directory).await?;
        let entries = report.entries;
        self.store.replace_all(entries.clone()).await;

        info!(files = entries.len(), failed = report.failures.len(), "Audio registry refreshed");

        self.events.emit_lossy(RegistryEvent::Refresh {
            entries: entries.clone(),
            count: entries.len(),
            timestamp: Utc::now(),
        });

        Ok(entries)
    }

    /// Receive `fileChange` and `refresh` notifications
    ///
    /// Dropping the receiver cancels the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn watcher_status(&self) -> WatcherStatus {
        self.watcher.status()
    }

    /// Canonical watched directory, once initialized
    pub async fn directory(&self) -> Option<PathBuf> {
        self.directory.read().await.clone()
    }

    /// Stop the watcher, clear the catalog and disconnect subscribers
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.watcher.stop().await;
        self.store.clear().await;
        self.events.close();
        if self.directory.write().await.take().is_some() {
            info!("Audio registry shut down");
        }
    }
}
