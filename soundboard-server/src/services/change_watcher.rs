//! Filesystem change watcher
//!
//! Keeps the catalog live while the server runs. The platform watcher
//! (`notify`) delivers raw events on its own thread into an unbounded
//! channel; a single tokio task drains the channel in delivery order and
//! applies each event to the `CatalogStore` as one atomic single-entry
//! mutation, then publishes a `fileChange` notification.
//!
//! Lifecycle: `Stopped -> Starting -> Watching -> Stopped`. A platform error
//! after startup moves the watcher to `Degraded`: it keeps running, but may
//! be missing updates. The last committed catalog stays valid and servable.

use chrono::Utc;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use soundboard_common::events::{ChangeKind, EventBus, RegistryEvent};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::catalog_store::CatalogStore;
use super::format_validator;
use super::metadata_builder::{BuildFailureKind, MetadataBuilder};

/// Watcher startup errors
#[derive(Debug, Error)]
pub enum WatchError {
    /// Platform watcher could not be created
    #[error("Failed to create file watcher: {0}")]
    Init(String),

    /// Directory could not be registered with the platform watcher
    #[error("Failed to watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },
}

/// Observable watcher health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherStatus {
    Stopped,
    Starting,
    Watching,
    /// Running, but a platform error was reported; updates may be missed
    Degraded,
}

impl WatcherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatcherStatus::Stopped => "stopped",
            WatcherStatus::Starting => "starting",
            WatcherStatus::Watching => "watching",
            WatcherStatus::Degraded => "degraded",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            WatcherStatus::Stopped => 0,
            WatcherStatus::Starting => 1,
            WatcherStatus::Watching => 2,
            WatcherStatus::Degraded => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WatcherStatus::Starting,
            2 => WatcherStatus::Watching,
            3 => WatcherStatus::Degraded,
            _ => WatcherStatus::Stopped,
        }
    }
}

/// Lock-free status cell shared between the handle and the event task
#[derive(Debug)]
struct StatusFlag(AtomicU8);

impl StatusFlag {
    fn new(status: WatcherStatus) -> Self {
        Self(AtomicU8::new(status.to_u8()))
    }

    fn get(&self) -> WatcherStatus {
        WatcherStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, status: WatcherStatus) {
        self.0.store(status.to_u8(), Ordering::Release);
    }
}

/// Catalog mutation derived from a platform event
#[derive(Debug, Clone, PartialEq, Eq)]
enum FsAction {
    /// File appeared or changed: rebuild and upsert
    Upsert(PathBuf),
    /// File went away
    Remove(PathBuf),
    /// Ambiguous rename: decide by checking whether the path still exists
    Reconcile(PathBuf),
}

/// Map a platform event onto catalog actions
fn classify(event: &Event) -> Vec<FsAction> {
    let each = |make: fn(PathBuf) -> FsAction| -> Vec<FsAction> {
        event.paths.iter().cloned().map(make).collect()
    };

    match event.kind {
        EventKind::Create(_) => each(FsAction::Upsert),
        EventKind::Remove(_) => each(FsAction::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(FsAction::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(FsAction::Upsert),
        // inotify also reports both halves separately as From/To
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => each(FsAction::Reconcile),
        EventKind::Modify(_) => each(FsAction::Upsert),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Everything the event task needs to apply changes
struct WatchContext {
    directory: PathBuf,
    builder: Arc<MetadataBuilder>,
    store: Arc<CatalogStore>,
    events: EventBus,
    status: Arc<StatusFlag>,
}

impl WatchContext {
    /// Plain filename of a direct child of the watched directory that is
    /// eligible for the catalog
    fn tracked_name<'a>(&self, path: &'a Path) -> Option<&'a str> {
        if path.parent() != Some(self.directory.as_path()) {
            return None;
        }
        let filename = path.file_name()?.to_str()?;
        format_validator::is_candidate(filename).then_some(filename)
    }

    /// Removing or renaming the watched directory kills the platform watch
    fn loses_directory(&self, event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
        ) && event.paths.iter().any(|path| path == &self.directory)
    }

    async fn handle_event(&self, event: Event) {
        if self.loses_directory(&event) {
            error!(
                directory = %self.directory.display(),
                "Watched directory removed or renamed, catalog updates stopped"
            );
            self.status.set(WatcherStatus::Degraded);
            return;
        }

        for action in classify(&event) {
            match action {
                FsAction::Upsert(path) => self.apply_upsert(&path).await,
                FsAction::Remove(path) => self.apply_remove(&path).await,
                FsAction::Reconcile(path) => {
                    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                        self.apply_upsert(&path).await;
                    } else {
                        self.apply_remove(&path).await;
                    }
                }
            }
        }
    }

    async fn apply_upsert(&self, path: &Path) {
        let Some(filename) = self.tracked_name(path) else {
            trace!(path = %path.display(), "Ignoring change for untracked file");
            return;
        };

        match self.builder.build(&self.directory, filename).await {
            Ok(entry) => {
                let previous = self.store.upsert(entry.clone()).await;
                let kind = if previous.is_some() {
                    ChangeKind::Change
                } else {
                    ChangeKind::Add
                };

                info!(file = %filename, event = kind.as_str(), "Catalog updated");
                self.events.emit_lossy(RegistryEvent::FileChange {
                    event: kind,
                    path: path.to_path_buf(),
                    entry: Some(entry),
                    timestamp: Utc::now(),
                });
            }
            // Freshly created files are often still empty; the write that
            // follows produces another event
            Err(failure) if failure.is_silent() || failure.kind == BuildFailureKind::Empty => {
                debug!(file = %filename, reason = %failure.kind, "Not cataloguing file");
            }
            Err(failure) => {
                warn!(
                    file = %filename,
                    reason = %failure.kind,
                    "Failed to rebuild metadata, keeping existing entry"
                );
            }
        }
    }

    async fn apply_remove(&self, path: &Path) {
        let Some(filename) = self.tracked_name(path) else {
            return;
        };

        if self.store.remove_by_filename(filename).await.is_some() {
            info!(file = %filename, event = "remove", "Catalog updated");
            self.events.emit_lossy(RegistryEvent::FileChange {
                event: ChangeKind::Remove,
                path: path.to_path_buf(),
                entry: None,
                timestamp: Utc::now(),
            });
        } else {
            trace!(file = %filename, "Remove event for file not in catalog");
        }
    }
}

/// Drain platform events until cancelled
async fn run_event_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ctx: WatchContext,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            message = rx.recv() => match message {
                Some(Ok(event)) => ctx.handle_event(event).await,
                Some(Err(e)) => {
                    error!(
                        directory = %ctx.directory.display(),
                        error = %e,
                        "File watcher error, catalog updates may be missed"
                    );
                    ctx.status.set(WatcherStatus::Degraded);
                }
                None => {
                    warn!("File watcher channel closed unexpectedly");
                    ctx.status.set(WatcherStatus::Degraded);
                    break;
                }
            },
        }
    }
    debug!("File watcher event loop exited");
}

struct RunningWatcher {
    watcher: RecommendedWatcher,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Handle to the background change watcher
pub struct ChangeWatcher {
    status: Arc<StatusFlag>,
    running: Mutex<Option<RunningWatcher>>,
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self {
            status: Arc::new(StatusFlag::new(WatcherStatus::Stopped)),
            running: Mutex::new(None),
        }
    }

    pub fn status(&self) -> WatcherStatus {
        self.status.get()
    }

    /// Begin watching `directory` (non-recursive)
    ///
    /// No-op if already running. On failure the watcher returns to `Stopped`.
    pub async fn start(
        &self,
        directory: PathBuf,
        builder: Arc<MetadataBuilder>,
        store: Arc<CatalogStore>,
        events: EventBus,
    ) -> Result<(), WatchError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("File watcher already running");
            return Ok(());
        }

        self.status.set(WatcherStatus::Starting);

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            // Receiver gone means the watcher is shutting down
            let _ = tx.send(result);
        })
        .and_then(|mut watcher| {
            watcher.watch(&directory, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });

        let watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                self.status.set(WatcherStatus::Stopped);
                return Err(match e.kind {
                    notify::ErrorKind::PathNotFound | notify::ErrorKind::Io(_) => WatchError::Watch {
                        path: directory,
                        reason: e.to_string(),
                    },
                    _ => WatchError::Init(e.to_string()),
                });
            }
        };

        let cancel = CancellationToken::new();
        let ctx = WatchContext {
            directory: directory.clone(),
            builder,
            store,
            events,
            status: Arc::clone(&self.status),
        };
        let task = tokio::spawn(run_event_loop(rx, ctx, cancel.clone()));

        *running = Some(RunningWatcher {
            watcher,
            cancel,
            task,
        });
        self.status.set(WatcherStatus::Watching);
        info!(directory = %directory.display(), "Watching audio directory for changes");
        Ok(())
    }

    /// Deregister the platform watcher and wait for the event task
    ///
    /// Safe to call when already stopped.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        drop(running.watcher);
        if let Err(e) = running.task.await {
            warn!("File watcher task ended abnormally: {}", e);
        }

        self.status.set(WatcherStatus::Stopped);
        info!("File watcher stopped");
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}
