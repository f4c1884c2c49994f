use std::collections::{BTreeMap, btree_map};

use bytes::Bytes;

use crate::{error::StoreError, keys::StateKey};

/// Read access to a state view: the committed store or any overlay stacked on it.
pub trait StateReader: Send + Sync {
    fn get(&self, key: &StateKey) -> Result<Option<Bytes>, StoreError>;
}

/// Writes collected by an overlay. `None` marks a deleted entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet(BTreeMap<StateKey, Option<Bytes>>);

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &StateKey) -> Option<&Option<Bytes>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, StateKey, Option<Bytes>> {
        self.0.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = (StateKey, Option<Bytes>);
    type IntoIter = btree_map::IntoIter<StateKey, Option<Bytes>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Copy-on-write overlay over a parent view.
///
/// Reads fall through to the parent unless the entry was written here. Writes never
/// reach the parent on their own: the owner either drops the overlay (discarding
/// everything) or takes its [`ChangeSet`] with [`CacheStore::into_changes`] and applies
/// it to the parent.
pub struct CacheStore<'a> {
    parent: &'a dyn StateReader,
    writes: BTreeMap<StateKey, Option<Bytes>>,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a dyn StateReader) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Opens a nested overlay reading through this one.
    pub fn branch(&self) -> CacheStore<'_> {
        CacheStore::new(self)
    }

    pub fn set(&mut self, key: StateKey, value: Bytes) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: StateKey) {
        self.writes.insert(key, None);
    }

    /// Merges the changes of a nested overlay into this one.
    pub fn apply(&mut self, changes: ChangeSet) {
        self.writes.extend(changes);
    }

    pub fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    pub fn into_changes(self) -> ChangeSet {
        ChangeSet(self.writes)
    }
}

impl StateReader for CacheStore<'_> {
    fn get(&self, key: &StateKey) -> Result<Option<Bytes>, StoreError> {
        match self.writes.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }
}
