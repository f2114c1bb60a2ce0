//! Subscriber registry persisted as a JSON document.

use crate::chat::ChatId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Subscriber store I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Subscriber store is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk document layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSubscribers {
    #[serde(default)]
    subscribers: Vec<ChatId>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// File holding the full subscriber set.
#[derive(Debug, Clone)]
pub struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored set.
    pub fn try_load(&self) -> Result<BTreeSet<ChatId>, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        let stored: StoredSubscribers = serde_json::from_str(&raw)?;
        Ok(stored.subscribers.into_iter().collect())
    }

    /// Read the stored set. Missing or unreadable storage yields an empty set.
    pub fn load(&self) -> BTreeSet<ChatId> {
        match self.try_load() {
            Ok(subscribers) => subscribers,
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No subscriber file, starting empty");
                BTreeSet::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable subscriber file");
                BTreeSet::new()
            }
        }
    }

    /// Replace the stored document with `subscribers`.
    ///
    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash mid-write leaves the previous document intact.
    pub async fn save(&self, subscribers: &BTreeSet<ChatId>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = StoredSubscribers {
            subscribers: subscribers.iter().copied().collect(),
            updated_at: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Set of chats receiving broadcasts.
///
/// Mutations are serialized by `writer` and persist the full set before it
/// is released, so concurrent `add`/`remove` calls never interleave their
/// writes. Reads only take the short in-memory lock.
#[derive(Debug)]
pub struct SubscriberRegistry {
    store: SubscriberStore,
    subscribers: Mutex<BTreeSet<ChatId>>,
    writer: tokio::sync::Mutex<()>,
}

impl SubscriberRegistry {
    /// Open the registry, rehydrating from `store`.
    pub fn open(store: SubscriberStore) -> Self {
        let subscribers = store.load();
        info!(
            path = %store.path().display(),
            count = subscribers.len(),
            "Loaded subscribers"
        );
        Self {
            store,
            subscribers: Mutex::new(subscribers),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns true if `chat_id` was not already subscribed.
    pub async fn add(&self, chat_id: ChatId) -> bool {
        let _writer = self.writer.lock().await;
        let snapshot = {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            if !subscribers.insert(chat_id) {
                return false;
            }
            subscribers.clone()
        };
        self.persist(&snapshot).await;
        info!(chat_id = chat_id, total = snapshot.len(), "Subscriber added");
        true
    }

    /// Returns true if `chat_id` was subscribed.
    pub async fn remove(&self, chat_id: ChatId) -> bool {
        let _writer = self.writer.lock().await;
        let snapshot = {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            if !subscribers.remove(&chat_id) {
                return false;
            }
            subscribers.clone()
        };
        self.persist(&snapshot).await;
        info!(chat_id = chat_id, total = snapshot.len(), "Subscriber removed");
        true
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chat_id)
    }

    /// Snapshot copy of the current set.
    pub fn list(&self) -> BTreeSet<ChatId> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // The in-memory set stays authoritative when the write fails; the next
    // mutation rewrites the whole set.
    async fn persist(&self, subscribers: &BTreeSet<ChatId>) {
        if let Err(e) = self.store.save(subscribers).await {
            error!(path = %self.store.path().display(), error = %e, "Failed to persist subscribers");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Unique scratch path under the system temp dir.
    pub(crate) fn temp_path(name: &str) -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("whale-alerts-{}-{}", std::process::id(), n))
            .join(name)
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let registry = SubscriberRegistry::open(SubscriberStore::new(temp_path("subscribers.json")));
        assert_eq!((registry.add(42).await, registry.add(42).await), (true, false));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SubscriberRegistry::open(SubscriberStore::new(temp_path("subscribers.json")));
        registry.add(1).await;
        assert!(registry.remove(1).await);
        assert!(!registry.remove(1).await);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let path = temp_path("subscribers.json");
        let registry = SubscriberRegistry::open(SubscriberStore::new(&path));
        registry.add(3).await;
        registry.add(-100123).await;
        registry.add(1).await;
        registry.remove(1).await;

        let reopened = SubscriberRegistry::open(SubscriberStore::new(&path));
        assert_eq!(reopened.list(), registry.list());
        assert_eq!(reopened.list().into_iter().collect::<Vec<_>>(), vec![-100123, 3]);

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["subscribers"], serde_json::json!([-100123, 3]));
        assert!(raw["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let path = temp_path("subscribers.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let store = SubscriberStore::new(&path);
        assert!(matches!(store.try_load(), Err(StoreError::Json(_))));

        let registry = SubscriberRegistry::open(store);
        assert_eq!(registry.count(), 0);
        assert!(registry.add(5).await);
        assert_eq!(SubscriberStore::new(&path).load().len(), 1);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let registry = SubscriberRegistry::open(SubscriberStore::new(temp_path("absent.json")));
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_list_is_a_copy() {
        let registry = SubscriberRegistry::open(SubscriberStore::new(temp_path("subscribers.json")));
        registry.add(1).await;
        let snapshot = registry.list();
        registry.add(2).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_keep_file_consistent() {
        let path = temp_path("subscribers.json");
        let registry = Arc::new(SubscriberRegistry::open(SubscriberStore::new(&path)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for i in 0..10 {
                        registry.add(t * 100 + i).await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.count(), 80);
        assert_eq!(SubscriberStore::new(&path).load(), registry.list());
    }
}
