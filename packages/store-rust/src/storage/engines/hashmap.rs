//! In-memory [`EntryCache`] implementation backed by [`DashMap`].
//!
//! Sharded locking gives per-key serialization between the background
//! change consumer and foreground writers without a collection-wide mutex.

use dashmap::DashMap;
use yuuri_core::Document;

use crate::storage::engine::EntryCache;

/// Entry cache backed by [`DashMap`].
pub struct HashMapCache {
    entries: DashMap<String, Document>,
}

impl HashMapCache {
    /// Creates a new, empty `HashMapCache`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for HashMapCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryCache for HashMapCache {
    fn get(&self, key: &str) -> Option<Document> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn set(&self, key: &str, value: Document) -> Option<Document> {
        self.entries.insert(key.to_string(), value)
    }

    fn delete(&self, key: &str) -> Option<Document> {
        self.entries.remove(key).map(|(_, doc)| doc)
    }

    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn snapshot(&self) -> Vec<(String, Document)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
