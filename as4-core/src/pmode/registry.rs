//! PMode registry
//!
//! Holds the PModes of one agent. Lookups hand out `Arc<PMode>` snapshots;
//! mutations swap whole entries under the write lock and are then persisted
//! through the registry's [`RecordStore`] once the lock is released. The
//! persistence lock is taken before the write lock is dropped, so the store
//! sees mutations in the order the map did.

use super::{validate_structure, PMode, StructuralError};
use crate::ebms::PartyId;
use crate::storage::{MemoryStore, RecordStore, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("PMode '{0}' already exists")]
    DuplicateId(String),

    #[error("PMode '{0}' not found")]
    NotFound(String),

    #[error("Party ids match more than one PMode: {0:?}")]
    AmbiguousParties(Vec<String>),

    #[error("Lock poisoned: a thread panicked while holding the lock")]
    LockPoisoned,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn handle_poison<T>(_err: PoisonError<T>) -> RegistryError {
    RegistryError::LockPoisoned
}

/// Registry of PModes keyed by id
pub struct PModeRegistry {
    pmodes: RwLock<HashMap<String, Arc<PMode>>>,
    store: Arc<dyn RecordStore<PMode>>,
    persisting: Mutex<()>,
}

impl PModeRegistry {
    /// Empty registry without persistence
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Empty registry persisting into `store`
    ///
    /// Records already in the store are not read; use [`PModeRegistry::load`].
    pub fn with_store(store: Arc<dyn RecordStore<PMode>>) -> Self {
        Self {
            pmodes: RwLock::new(HashMap::new()),
            store,
            persisting: Mutex::new(()),
        }
    }

    /// Build a registry from every PMode in `store`
    pub fn load(store: Arc<dyn RecordStore<PMode>>) -> RegistryResult<Self> {
        let mut pmodes = HashMap::new();
        for pmode in store.load_all()? {
            if pmodes.contains_key(&pmode.id) {
                return Err(RegistryError::DuplicateId(pmode.id));
            }
            pmodes.insert(pmode.id.clone(), Arc::new(pmode));
        }

        info!(count = pmodes.len(), "Loaded PModes");

        Ok(Self {
            pmodes: RwLock::new(pmodes),
            store,
            persisting: Mutex::new(()),
        })
    }

    pub fn add(&self, pmode: PMode) -> RegistryResult<()> {
        let id = pmode.id.clone();
        let pmode = Arc::new(pmode);
        let _persisting = {
            let mut pmodes = self.pmodes.write().map_err(handle_poison)?;
            if pmodes.contains_key(&id) {
                return Err(RegistryError::DuplicateId(id));
            }
            pmodes.insert(id.clone(), Arc::clone(&pmode));
            self.persist_guard()
        };

        debug!(pmode = %id, "Added PMode");
        self.persist(&pmode);
        Ok(())
    }

    /// Replace an existing PMode
    pub fn update(&self, pmode: PMode) -> RegistryResult<()> {
        let id = pmode.id.clone();
        let pmode = Arc::new(pmode);
        let _persisting = {
            let mut pmodes = self.pmodes.write().map_err(handle_poison)?;
            match pmodes.get_mut(&id) {
                Some(slot) => *slot = Arc::clone(&pmode),
                None => return Err(RegistryError::NotFound(id)),
            }
            self.persist_guard()
        };

        debug!(pmode = %id, "Updated PMode");
        self.persist(&pmode);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> RegistryResult<Option<Arc<PMode>>> {
        let (removed, _persisting) = {
            let mut pmodes = self.pmodes.write().map_err(handle_poison)?;
            (pmodes.remove(id), self.persist_guard())
        };

        if removed.is_some() {
            debug!(pmode = %id, "Removed PMode");
            if let Err(e) = self.store.delete(id) {
                warn!(pmode = %id, error = %e, "Failed to delete persisted PMode");
            }
        }
        Ok(removed)
    }

    pub fn find(&self, id: &str) -> RegistryResult<Option<Arc<PMode>>> {
        Ok(self.pmodes.read().map_err(handle_poison)?.get(id).cloned())
    }

    /// Find the single PMode whose initiator is among `senders` and whose
    /// responder is among `receivers`
    pub fn find_by_parties(
        &self,
        senders: &[PartyId],
        receivers: &[PartyId],
    ) -> RegistryResult<Option<Arc<PMode>>> {
        let pmodes = self.pmodes.read().map_err(handle_poison)?;

        let mut matches: Vec<&Arc<PMode>> = pmodes
            .values()
            .filter(|pmode| {
                let initiator = pmode
                    .initiator
                    .as_ref()
                    .map_or(false, |p| senders.iter().any(|id| p.matches(id)));
                let responder = pmode
                    .responder
                    .as_ref()
                    .map_or(false, |p| receivers.iter().any(|id| p.matches(id)));
                initiator && responder
            })
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop().cloned()),
            _ => {
                let mut ids: Vec<String> = matches.iter().map(|p| p.id.clone()).collect();
                ids.sort();
                Err(RegistryError::AmbiguousParties(ids))
            }
        }
    }

    /// Structural check of every registered PMode
    pub fn validate_all(&self) -> RegistryResult<Vec<StructuralError>> {
        let pmodes = self.all()?;
        Ok(pmodes.iter().flat_map(|p| validate_structure(p)).collect())
    }

    /// All PModes sorted by id
    pub fn all(&self) -> RegistryResult<Vec<Arc<PMode>>> {
        let mut all: Vec<Arc<PMode>> = self
            .pmodes
            .read()
            .map_err(handle_poison)?
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    pub fn ids(&self) -> RegistryResult<Vec<String>> {
        Ok(self.all()?.iter().map(|p| p.id.clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.pmodes.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist_guard(&self) -> MutexGuard<'_, ()> {
        self.persisting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, pmode: &PMode) {
        if let Err(e) = self.store.save(pmode) {
            warn!(pmode = %pmode.id, error = %e, "Failed to persist PMode");
        }
    }
}

impl Default for PModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PModeRegistry")
            .field("len", &self.len())
            .finish()
    }
}
