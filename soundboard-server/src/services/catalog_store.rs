//! In-memory catalog store
//!
//! The single mutable source of truth for the registry. State lives in an
//! immutable `CatalogSnapshot` behind an `Arc`; readers clone the `Arc` and
//! never observe a partially applied mutation. Writers take the write lock
//! for the whole mutation, so mutations are serialized and the later commit
//! wins. Single-entry mutations are copy-on-write (`Arc::make_mut`), a full
//! replace swaps in a snapshot built outside the lock.

use soundboard_common::CatalogEntry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Point-in-time, internally consistent view of the catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Entries keyed (and ordered) by filename
    entries: BTreeMap<String, CatalogEntry>,
    /// id -> filename
    ids: HashMap<String, String>,
}

impl CatalogSnapshot {
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut snapshot = Self::default();
        for entry in entries {
            snapshot.insert(entry);
        }
        snapshot
    }

    /// Insert into the entry's filename slot, dropping any id it displaces
    ///
    /// Returns the entry previously held for the same filename.
    fn insert(&mut self, entry: CatalogEntry) -> Option<CatalogEntry> {
        if let Some(stale) = self.ids.remove(&entry.id) {
            if stale != entry.filename {
                self.entries.remove(&stale);
            }
        }

        let id = entry.id.clone();
        self.ids.insert(id.clone(), entry.filename.clone());
        let previous = self.entries.insert(entry.filename.clone(), entry);

        if let Some(previous) = &previous {
            if previous.id != id {
                self.ids.remove(&previous.id);
            }
        }
        previous
    }

    fn remove_by_filename(&mut self, filename: &str) -> Option<CatalogEntry> {
        let removed = self.entries.remove(filename)?;
        self.ids.remove(&removed.id);
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.ids.get(id).and_then(|filename| self.entries.get(filename))
    }

    pub fn get_by_filename(&self, filename: &str) -> Option<&CatalogEntry> {
        self.entries.get(filename)
    }

    /// Entries in filename order
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Concurrent owner of the live catalog
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; cheap, and unaffected by later mutations
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Discard the whole catalog and install `entries` as one transition
    pub async fn replace_all(&self, entries: Vec<CatalogEntry>) {
        let next = Arc::new(CatalogSnapshot::from_entries(entries));
        let mut guard = self.current.write().await;
        *guard = next;
    }

    /// Insert or replace a single entry
    ///
    /// An entry with the same filename is replaced in place (its old id stops
    /// resolving). Returns the replaced entry, if any.
    pub async fn upsert(&self, entry: CatalogEntry) -> Option<CatalogEntry> {
        let mut guard = self.current.write().await;
        Arc::make_mut(&mut *guard).insert(entry)
    }

    /// Remove the entry for `filename`; no-op if absent
    pub async fn remove_by_filename(&self, filename: &str) -> Option<CatalogEntry> {
        let mut guard = self.current.write().await;
        if guard.get_by_filename(filename).is_none() {
            return None;
        }
        Arc::make_mut(&mut *guard).remove_by_filename(filename)
    }

    pub async fn clear(&self) {
        let mut guard = self.current.write().await;
        *guard = Arc::new(CatalogSnapshot::default());
    }

    /// Copy of every entry, in filename order
    pub async fn all(&self) -> Vec<CatalogEntry> {
        self.snapshot().await.entries().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.current.read().await.get(id).cloned()
    }

    pub async fn get_by_filename(&self, filename: &str) -> Option<CatalogEntry> {
        self.current.read().await.get_by_filename(filename).cloned()
    }

    pub async fn count(&self) -> usize {
        self.current.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn entry(id: &str, filename: &str) -> CatalogEntry {
        let now = Utc::now();
        CatalogEntry {
            id: id.to_string(),
            filename: filename.to_string(),
            display_name: filename.to_string(),
            extension: "wav".to_string(),
            size: 100,
            path: PathBuf::from("/sounds").join(filename),
            content_type: "audio/wav".to_string(),
            created_at: now,
            modified_at: now,
        }
    }

    #[tokio::test]
    async fn test_replace_all_discards_previous_entries() {
        let store = CatalogStore::new();
        store.replace_all(vec![entry("1", "a.wav"), entry("2", "b.wav")]).await;
        assert_eq!(store.count().await, 2);

        store.replace_all(vec![entry("3", "c.wav")]).await;
        assert_eq!(store.count().await, 1);
        assert!(store.get("1").await.is_none());
        assert_eq!(store.get("3").await.unwrap().filename, "c.wav");
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_filename_slot() {
        let store = CatalogStore::new();
        assert!(store.upsert(entry("old", "kick.wav")).await.is_none());

        let previous = store.upsert(entry("new", "kick.wav")).await;
        assert_eq!(previous.unwrap().id, "old");

        assert_eq!(store.count().await, 1);
        assert!(store.get("old").await.is_none());
        assert_eq!(store.get("new").await.unwrap().filename, "kick.wav");
    }

    #[tokio::test]
    async fn test_remove_by_filename() {
        let store = CatalogStore::new();
        store.upsert(entry("1", "kick.wav")).await;

        assert!(store.remove_by_filename("snare.wav").await.is_none());
        let removed = store.remove_by_filename("kick.wav").await.unwrap();
        assert_eq!(removed.id, "1");
        assert_eq!(store.count().await, 0);
        assert!(store.get("1").await.is_none());
    }

    #[tokio::test]
    async fn test_all_returns_independent_copy() {
        let store = CatalogStore::new();
        store.upsert(entry("1", "b.wav")).await;
        store.upsert(entry("2", "a.wav")).await;

        let mut listed = store.all().await;
        assert_eq!(listed[0].filename, "a.wav");
        assert_eq!(listed[1].filename, "b.wav");

        listed.clear();
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_mutation() {
        let store = CatalogStore::new();
        store.upsert(entry("1", "a.wav")).await;

        let before = store.snapshot().await;
        store.upsert(entry("2", "b.wav")).await;
        store.remove_by_filename("a.wav").await;

        assert_eq!(before.len(), 1);
        assert!(before.get("1").is_some());
        assert_eq!(store.count().await, 1);
    }

    #[test]
    fn test_snapshot_from_duplicate_filenames_keeps_last() {
        let snapshot = CatalogSnapshot::from_entries(vec![entry("1", "a.wav"), entry("2", "a.wav")]);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("1").is_none());
        assert!(snapshot.get("2").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_observe_mixed_catalog() {
        let store = Arc::new(CatalogStore::new());
        let generation = |tag: &str| -> Vec<CatalogEntry> {
            (0..50)
                .map(|i| entry(&format!("{tag}-{i}"), &format!("{tag}_{i:02}.wav")))
                .collect()
        };
        store.replace_all(generation("old")).await;

        let writer = {
            let store = Arc::clone(&store);
            let old = generation("old");
            let new = generation("new");
            tokio::spawn(async move {
                for round in 0..200 {
                    let next = if round % 2 == 0 { new.clone() } else { old.clone() };
                    store.replace_all(next).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let listed = store.all().await;
                    assert_eq!(listed.len(), 50);
                    let first_tag = listed[0].id.split('-').next().unwrap().to_string();
                    assert!(
                        listed.iter().all(|e| e.id.starts_with(&first_tag)),
                        "snapshot mixed two catalogs"
                    );
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    fn filenames(snapshot: &CatalogSnapshot) -> std::collections::BTreeSet<String> {
        snapshot.entries().map(|e| e.filename.clone()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_file_writes_race_replace_all() {
        let store = Arc::new(CatalogStore::new());
        let old: Vec<_> = (0..20)
            .map(|i| entry(&format!("old-{i}"), &format!("old_{i:02}.wav")))
            .collect();
        let replacement: Vec<_> = (0..20)
            .map(|i| entry(&format!("new-{i}"), &format!("new_{i:02}.wav")))
            .collect();

        let replaced: std::collections::BTreeSet<String> =
            replacement.iter().map(|e| e.filename.clone()).collect();
        let mut with_extra = replaced.clone();
        with_extra.insert("extra.wav".to_string());
        let mut without_member = replaced.clone();
        without_member.remove("new_07.wav");

        for _ in 0..100 {
            store.replace_all(old.clone()).await;

            let swap = {
                let store = Arc::clone(&store);
                let replacement = replacement.clone();
                tokio::spawn(async move { store.replace_all(replacement).await })
            };
            let add = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.upsert(entry("extra", "extra.wav")).await })
            };
            swap.await.unwrap();
            add.await.unwrap();

            let after_upsert = filenames(&*store.snapshot().await);
            assert!(
                after_upsert == replaced || after_upsert == with_extra,
                "partial catalog after upsert race: {after_upsert:?}"
            );

            store.replace_all(old.clone()).await;
            let swap = {
                let store = Arc::clone(&store);
                let replacement = replacement.clone();
                tokio::spawn(async move { store.replace_all(replacement).await })
            };
            let drop_one = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.remove_by_filename("new_07.wav").await })
            };
            swap.await.unwrap();
            drop_one.await.unwrap();

            let after_remove = filenames(&*store.snapshot().await);
            assert!(
                after_remove == replaced || after_remove == without_member,
                "partial catalog after remove race: {after_remove:?}"
            );
        }
    }
}
