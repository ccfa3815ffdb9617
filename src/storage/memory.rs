// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use super::traits::{Collection, DurableStore, StorageError, StoredItem};

/// In-process engine. Nothing survives a restart; used for tests and
/// clients that opt out of persistence.
pub struct InMemoryStore {
    data: DashMap<(Collection, String), StoredItem>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Total records across all collections
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn put(&self, collection: Collection, item: &StoredItem) -> Result<(), StorageError> {
        self.data.insert((collection, item.id.clone()), item.clone());
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredItem>, StorageError> {
        Ok(self
            .data
            .get(&(collection, id.to_string()))
            .map(|r| r.value().clone()))
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<StoredItem>, StorageError> {
        let mut items: Vec<StoredItem> = self
            .data
            .iter()
            .filter(|r| r.key().0 == collection)
            .map(|r| r.value().clone())
            .collect();
        // Match the SQL engine's ordering
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StorageError> {
        self.data.remove(&(collection, id.to_string()));
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> Result<(), StorageError> {
        self.data.retain(|k, _| k.0 != collection);
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StorageError> {
        Ok(self.data.iter().filter(|r| r.key().0 == collection).count() as u64)
    }
}
