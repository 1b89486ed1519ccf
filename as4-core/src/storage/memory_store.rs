//! In-memory record store
//!
//! Used when persistence is disabled, and by tests to observe what the
//! registry and duplicate manager write.

use super::{handle_poison, Record, RecordStore, StorageResult};
use hashlink::LinkedHashMap;
use std::sync::RwLock;

/// In-memory record store (non-persistent)
pub struct MemoryStore<T: Record> {
    records: RwLock<LinkedHashMap<String, T>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(LinkedHashMap::new()),
        }
    }

    /// Pre-populated store, e.g. PModes provisioned by code
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.record_id().to_string(), r))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .read()
            .map(|r| r.contains_key(id))
            .unwrap_or(false)
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordStore<T> for MemoryStore<T> {
    fn load_all(&self) -> StorageResult<Vec<T>> {
        Ok(self
            .records
            .read()
            .map_err(handle_poison)?
            .values()
            .cloned()
            .collect())
    }

    fn save(&self, record: &T) -> StorageResult<()> {
        self.records
            .write()
            .map_err(handle_poison)?
            .replace(record.record_id().to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        self.records.write().map_err(handle_poison)?.remove(id);
        Ok(())
    }

    fn delete_many(&self, ids: &[String]) -> StorageResult<()> {
        let mut records = self.records.write().map_err(handle_poison)?;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.records.write().map_err(handle_poison)?.clear();
        Ok(())
    }
}
