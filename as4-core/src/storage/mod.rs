//! Record persistence
//!
//! The PMode registry and the duplicate manager keep their working set in
//! memory and notify a [`RecordStore`] after every mutation. Two stores are
//! provided:
//! - [`MemoryStore`]: nothing leaves the process
//! - [`JsonFileStore`]: the whole collection is rewritten atomically to one JSON file

mod file_store;
mod memory_store;

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::PoisonError;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Lock poisoned: a thread panicked while holding the lock")]
    LockPoisoned,
}

/// Helper to convert poison errors into StorageError
pub(crate) fn handle_poison<T>(_err: PoisonError<T>) -> StorageError {
    StorageError::LockPoisoned
}

/// A value persisted under a string id
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_id(&self) -> &str;
}

/// Persistence contract for one record collection
///
/// Implementations must never be called while the owner holds its own lock.
pub trait RecordStore<T: Record>: Send + Sync {
    /// Load every persisted record
    fn load_all(&self) -> StorageResult<Vec<T>>;

    /// Insert or replace a record
    fn save(&self, record: &T) -> StorageResult<()>;

    /// Delete a record; deleting an unknown id is not an error
    fn delete(&self, id: &str) -> StorageResult<()>;

    /// Delete a batch of records
    fn delete_many(&self, ids: &[String]) -> StorageResult<()> {
        for id in ids {
            self.delete(id)?;
        }
        Ok(())
    }

    /// Delete every record
    fn clear(&self) -> StorageResult<()>;
}
