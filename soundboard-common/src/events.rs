//! Registry event types and the broadcast EventBus
//!
//! The registry is an event source with two notification kinds:
//! - `fileChange`: a single file was added, changed or removed by the watcher
//! - `refresh`: a full rescan replaced the whole catalog
//!
//! Subscribing is optional. Polling the registry is always valid, and emitting
//! with no subscribers is not an error.

use crate::models::CatalogEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Kind of filesystem change observed for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// File was not tracked before and is now in the catalog
    Add,
    /// Tracked file was rebuilt (new id, same slot)
    Change,
    /// Tracked file left the catalog
    Remove,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Remove => "remove",
        }
    }
}

/// Notification emitted by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    /// One file changed on disk and the catalog was updated
    #[serde(rename_all = "camelCase")]
    FileChange {
        /// What happened to the file
        event: ChangeKind,
        /// Absolute path of the file
        path: PathBuf,
        /// The committed entry (absent for removals)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<CatalogEntry>,
        /// When the change was committed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Catalog was rebuilt from a full directory scan
    #[serde(rename_all = "camelCase")]
    Refresh {
        /// Complete new entry set
        entries: Vec<CatalogEntry>,
        /// Number of entries
        count: usize,
        /// When the new catalog was committed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RegistryEvent {
    /// Event name as used on the wire (SSE `event:` field)
    pub fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::FileChange { .. } => "fileChange",
            RegistryEvent::Refresh { .. } => "refresh",
        }
    }
}

/// Broadcast bus for registry events
///
/// Uses `tokio::broadcast` internally. Cloning the bus shares the same
/// channel. `close()` swaps in a fresh channel so that every existing
/// subscriber observes `RecvError::Closed`.
#[derive(Clone)]
pub struct EventBus {
    tx: Arc<RwLock<broadcast::Sender<RegistryEvent>>>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use soundboard_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx: Arc::new(RwLock::new(tx)),
            capacity,
        }
    }

    /// Subscribe to all future events
    ///
    /// Dropping the receiver cancels the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender().subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RegistryEvent) {
        let _ = self.sender().send(event);
    }

    /// Disconnect every current subscriber
    pub fn close(&self) {
        let (fresh, _) = broadcast::channel(self.capacity);
        let mut guard = self.tx.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = fresh;
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender().receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn sender(&self) -> broadcast::Sender<RegistryEvent> {
        self.tx
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refresh_event(count: usize) -> RegistryEvent {
        RegistryEvent::Refresh {
            entries: Vec::new(),
            count,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_emit_delivers_to_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit_lossy(refresh_event(3));

        assert_eq!(rx1.try_recv().unwrap().event_type(), "refresh");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "refresh");
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(2);
        for i in 0..10 {
            bus.emit_lossy(refresh_event(i));
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_close_disconnects_subscribers() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        bus.close();

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
        assert_eq!(bus.subscriber_count(), 0);

        // Bus remains usable for new subscribers
        let mut rx2 = bus.subscribe();
        bus.emit_lossy(refresh_event(0));
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_file_change_wire_format() {
        let event = RegistryEvent::FileChange {
            event: ChangeKind::Remove,
            path: PathBuf::from("/sounds/kick.wav"),
            entry: None,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fileChange");
        assert_eq!(json["event"], "remove");
        assert_eq!(json["path"], "/sounds/kick.wav");
        assert!(json.get("entry").is_none());
    }

    #[test]
    fn test_refresh_wire_format() {
        let json = serde_json::to_value(refresh_event(2)).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["count"], 2);
        assert!(json["entries"].as_array().unwrap().is_empty());
    }
}
