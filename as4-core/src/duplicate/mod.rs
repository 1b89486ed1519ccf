//! Duplicate message suppression
//!
//! Remembers every received message id so that a re-delivered message is
//! acknowledged without being dispatched twice. The key is the message id
//! alone, independent of the PMode the message arrived under.

use crate::storage::{MemoryStore, Record, RecordStore, StorageError};
use chrono::{DateTime, Utc};
use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};

/// One received message id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateItem {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmode_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DuplicateItem {
    pub fn new(
        message_id: impl Into<String>,
        profile_id: Option<&str>,
        pmode_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            profile_id: profile_id.map(str::to_string),
            pmode_id: pmode_id.map(str::to_string),
            timestamp,
        }
    }
}

impl PartialEq for DuplicateItem {
    fn eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id
    }
}

impl Eq for DuplicateItem {}

impl Hash for DuplicateItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.message_id.hash(state);
    }
}

impl Record for DuplicateItem {
    fn record_id(&self) -> &str {
        &self.message_id
    }
}

/// Outcome of [`DuplicateManager::register_and_check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// First sighting, or no id to check
    Continue,
    AlreadySeen,
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        *self == DuplicateCheck::AlreadySeen
    }
}

/// Store of seen message ids
///
/// Reads never block each other. The check-and-insert in
/// [`register_and_check_at`](Self::register_and_check_at) happens in one
/// write-lock critical section so two concurrent deliveries of the same id
/// cannot both see `Continue`. Store writes happen after the write lock is
/// released but under a persistence lock taken before it, keeping the
/// store in step with the map.
pub struct DuplicateManager {
    items: RwLock<LinkedHashMap<String, DuplicateItem>>,
    store: Arc<dyn RecordStore<DuplicateItem>>,
    persisting: Mutex<()>,
}

impl DuplicateManager {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn RecordStore<DuplicateItem>>) -> Self {
        Self {
            items: RwLock::new(LinkedHashMap::new()),
            store,
            persisting: Mutex::new(()),
        }
    }

    /// Rebuild from persisted items, oldest first
    pub fn load(store: Arc<dyn RecordStore<DuplicateItem>>) -> Result<Self, StorageError> {
        let mut loaded = store.load_all()?;
        loaded.sort_by_key(|item| item.timestamp);

        let mut items = LinkedHashMap::new();
        for item in loaded {
            items.insert(item.message_id.clone(), item);
        }

        debug!(count = items.len(), "Loaded duplicate items");

        Ok(Self {
            items: RwLock::new(items),
            store,
            persisting: Mutex::new(()),
        })
    }

    pub fn register_and_check(
        &self,
        message_id: Option<&str>,
        profile_id: Option<&str>,
        pmode_id: Option<&str>,
    ) -> DuplicateCheck {
        self.register_and_check_at(message_id, profile_id, pmode_id, Utc::now())
    }

    /// Register `message_id` received at `timestamp`
    ///
    /// An absent or empty id is never stored and always continues. A lock
    /// poisoned by a panicking writer is recovered: the map itself is never
    /// left half-updated.
    pub fn register_and_check_at(
        &self,
        message_id: Option<&str>,
        profile_id: Option<&str>,
        pmode_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> DuplicateCheck {
        let message_id = match message_id {
            Some(id) if !id.is_empty() => id,
            _ => return DuplicateCheck::Continue,
        };

        let (item, _persisting) = {
            let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
            if items.contains_key(message_id) {
                return DuplicateCheck::AlreadySeen;
            }
            let item = DuplicateItem::new(message_id, profile_id, pmode_id, timestamp);
            items.insert(message_id.to_string(), item.clone());
            (item, self.persist_guard())
        };

        if let Err(e) = self.store.save(&item) {
            warn!(message_id = %item.message_id, error = %e, "Failed to persist duplicate item");
        }
        DuplicateCheck::Continue
    }

    /// Remove every item with a timestamp strictly before `cutoff`
    ///
    /// Returns the evicted message ids in insertion order.
    pub fn evict_items_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let (evicted, _persisting) = {
            let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
            let evicted: Vec<String> = items
                .iter()
                .filter(|(_, item)| item.timestamp < cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &evicted {
                items.remove(id);
            }
            (evicted, self.persist_guard())
        };

        if !evicted.is_empty() {
            debug!(count = evicted.len(), %cutoff, "Evicted duplicate items");
            if let Err(e) = self.store.delete_many(&evicted) {
                warn!(error = %e, "Failed to delete evicted duplicate items");
            }
        }
        evicted
    }

    pub fn clear(&self) {
        let _persisting = {
            let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
            items.clear();
            self.persist_guard()
        };
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted duplicate items");
        }
    }

    fn persist_guard(&self) -> MutexGuard<'_, ()> {
        self.persisting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(message_id)
    }

    /// First item, in insertion order, matching `predicate`
    pub fn find_first<F>(&self, predicate: F) -> Option<DuplicateItem>
    where
        F: Fn(&DuplicateItem) -> bool,
    {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .find(|item| predicate(item))
            .cloned()
    }

    /// Every item in insertion order
    pub fn all(&self) -> Vec<DuplicateItem> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

impl Default for DuplicateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DuplicateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateManager")
            .field("len", &self.len())
            .finish()
    }
}
