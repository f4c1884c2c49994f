use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bytes::Bytes;
use tracing::debug;

use crate::{
    error::StoreError,
    keys::StateKey,
    overlay::{CacheStore, ChangeSet, StateReader},
};

/// Committed chain state. Cloning is cheap and every clone observes the same data.
#[derive(Default, Clone)]
pub struct Store(Arc<RwLock<StoreInner>>);

#[derive(Default, Debug)]
struct StoreInner {
    /// Shared with live snapshots, copied on the first write after one was taken
    entries: Arc<BTreeMap<StateKey, Bytes>>,
    /// Number of change sets applied so far
    commits: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<RwLockReadGuard<'_, StoreInner>, StoreError> {
        self.0.read().map_err(|_| StoreError::ReadLock)
    }

    fn inner_mut(&self) -> Result<RwLockWriteGuard<'_, StoreInner>, StoreError> {
        self.0.write().map_err(|_| StoreError::WriteLock)
    }

    /// Opens a non-committing view over the current state.
    pub fn overlay(&self) -> CacheStore<'_> {
        CacheStore::new(self)
    }

    /// Freezes the state committed so far. Later [`Store::apply`] calls are not
    /// visible through the returned snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let inner = self.inner()?;
        Ok(Snapshot {
            entries: inner.entries.clone(),
            commits: inner.commits,
        })
    }

    /// Atomically writes every entry of `changes`.
    pub fn apply(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner_mut()?;
        let written = changes.len();
        let entries = Arc::make_mut(&mut inner.entries);
        for (key, value) in changes {
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        inner.commits += 1;
        debug!(written, commits = inner.commits, "Applied state changes");
        Ok(())
    }

    pub fn commits(&self) -> Result<u64, StoreError> {
        Ok(self.inner()?.commits)
    }
}

impl StateReader for Store {
    fn get(&self, key: &StateKey) -> Result<Option<Bytes>, StoreError> {
        Ok(self.inner()?.entries.get(key).cloned())
    }
}

/// Immutable view of the store as of one commit.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Arc<BTreeMap<StateKey, Bytes>>,
    commits: u64,
}

impl Snapshot {
    pub fn overlay(&self) -> CacheStore<'_> {
        CacheStore::new(self)
    }

    /// Number of change sets the snapshot includes.
    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl StateReader for Snapshot {
    fn get(&self, key: &StateKey) -> Result<Option<Bytes>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
