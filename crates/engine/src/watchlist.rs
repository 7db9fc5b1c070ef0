use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use entmerge_core::EntityId;
use entmerge_storage::StorageError;

/// Who watches which entity. Merges copy the source's watchers onto the target.
pub trait WatchlistStore: Send + Sync {
    /// Returns how many watchers were newly added to `to`.
    fn duplicate_entries(&self, from: EntityId, to: EntityId) -> Result<usize, StorageError>;
}

#[derive(Debug, Default)]
pub struct InMemoryWatchlist {
    entries: Mutex<BTreeMap<EntityId, BTreeSet<String>>>,
}

impl InMemoryWatchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&self, user: &str, id: EntityId) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        entries.entry(id).or_default().insert(user.to_string());
        Ok(())
    }

    pub fn watchers(&self, id: EntityId) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(&id).map(|w| w.iter().cloned().collect()).unwrap_or_default())
    }
}

impl WatchlistStore for InMemoryWatchlist {
    fn duplicate_entries(&self, from: EntityId, to: EntityId) -> Result<usize, StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        let watchers = entries.get(&from).cloned().unwrap_or_default();
        let target = entries.entry(to).or_default();
        let before = target.len();
        target.extend(watchers);
        Ok(target.len() - before)
    }
}
