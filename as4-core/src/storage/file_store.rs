//! JSON file record store
//!
//! The collection is held as one JSON array. Every mutation rewrites the
//! file through a temporary sibling and a rename, so a crash leaves either
//! the old or the new collection on disk.

use super::{handle_poison, Record, RecordStore, StorageError, StorageResult};
use hashlink::LinkedHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File-backed record store
pub struct JsonFileStore<T: Record> {
    path: PathBuf,
    /// Mirror of the file contents, in file order
    cache: Mutex<LinkedHashMap<String, T>>,
}

impl<T: Record> JsonFileStore<T> {
    /// Open a store, reading the file if it exists
    ///
    /// Parent directories are created. A file containing two records with
    /// the same id is rejected.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut cache = LinkedHashMap::new();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if !contents.trim().is_empty() {
                let records: Vec<T> = serde_json::from_str(&contents)?;
                for record in records {
                    let id = record.record_id().to_string();
                    if cache.contains_key(&id) {
                        return Err(StorageError::DuplicateId(id));
                    }
                    cache.insert(id, record);
                }
            }
        }

        tracing::debug!(path = %path.display(), records = cache.len(), "Opened JSON record store");

        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, records: &LinkedHashMap<String, T>) -> StorageResult<()> {
        let values: Vec<&T> = records.values().collect();
        let json = serde_json::to_string_pretty(&values)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl<T: Record> RecordStore<T> for JsonFileStore<T> {
    fn load_all(&self) -> StorageResult<Vec<T>> {
        Ok(self
            .cache
            .lock()
            .map_err(handle_poison)?
            .values()
            .cloned()
            .collect())
    }

    fn save(&self, record: &T) -> StorageResult<()> {
        let mut cache = self.cache.lock().map_err(handle_poison)?;
        cache.replace(record.record_id().to_string(), record.clone());
        self.flush(&cache)
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        let mut cache = self.cache.lock().map_err(handle_poison)?;
        if cache.remove(id).is_some() {
            self.flush(&cache)?;
        }
        Ok(())
    }

    fn delete_many(&self, ids: &[String]) -> StorageResult<()> {
        let mut cache = self.cache.lock().map_err(handle_poison)?;
        let before = cache.len();
        for id in ids {
            cache.remove(id);
        }
        if cache.len() != before {
            self.flush(&cache)?;
        }
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut cache = self.cache.lock().map_err(handle_poison)?;
        cache.clear();
        self.flush(&cache)
    }
}
