//! Hash-map backend.
//!
//! Same contract and error reporting as the B-tree, with no ordering at all.
//! Traversal order is whatever the hash map yields.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::storage::{Entry, Key, KeyedStorage, StorageError, check_key};

/// A `HashMap` behind one mutex.
///
/// Entries are stored whole so `traverse` can hand out `&Entry<V>` without
/// copying payloads.
#[derive(Debug)]
pub struct MapStorage<V> {
    entries: Mutex<HashMap<Key, Entry<V>>>,
}

impl<V> MapStorage<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> Default for MapStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send> KeyedStorage<V> for MapStorage<V> {
    fn insert(&self, key: Key, value: V) -> Result<Option<V>, StorageError> {
        check_key(key)?;
        let previous = self.entries.lock().insert(key, Entry::new(key, value));
        Ok(previous.map(|entry| entry.value))
    }

    fn search(&self, key: Key) -> Result<V, StorageError>
    where
        V: Clone,
    {
        check_key(key)?;
        self.entries
            .lock()
            .get(&key)
            .map(|entry| entry.value.clone())
            .ok_or(StorageError::NotFound(key))
    }

    fn delete(&self, key: Key) -> Result<V, StorageError> {
        let mut entries = self.entries.lock();
        if entries.is_empty() {
            return Err(StorageError::UninitializedStorage);
        }
        check_key(key)?;
        entries
            .remove(&key)
            .map(|entry| entry.value)
            .ok_or(StorageError::KeyNotFound(key))
    }

    fn traverse(&self, visit: &mut dyn FnMut(&Entry<V>)) -> Result<(), StorageError> {
        let entries = self.entries.lock();
        for entry in entries.values() {
            visit(entry);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
