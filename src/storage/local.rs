// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable local store.
//!
//! Typed key-value access with per-record expiry over any [`DurableStore`]
//! engine. Expired records are filtered out of `get`/`get_all` and deleted on
//! the way. Engine errors are returned unchanged; callers decide whether to
//! degrade to a miss.
//!
//! # Example
//!
//! ```
//! use locus_core::storage::{Collection, InMemoryStore, LocalStore};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), locus_core::StorageError> {
//! let store = LocalStore::new(Arc::new(InMemoryStore::new()));
//! store.init().await?;
//!
//! store.set(Collection::Places, "p1", &json!({"id": "p1"}), Some(Duration::from_secs(60))).await?;
//! let place: Option<serde_json::Value> = store.get(Collection::Places, "p1").await?;
//! assert_eq!(place, Some(json!({"id": "p1"})));
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use super::traits::{Collection, DurableStore, StorageError, StoredItem};
use crate::clock::now_millis;

/// Handle to the durable local store. Cheap to clone.
#[derive(Clone)]
pub struct LocalStore {
    engine: Arc<dyn DurableStore>,
    initialized: Arc<OnceCell<()>>,
}

impl LocalStore {
    pub fn new(engine: Arc<dyn DurableStore>) -> Self {
        Self {
            engine,
            initialized: Arc::new(OnceCell::new()),
        }
    }

    /// Initialize the engine once. Concurrent callers await the same run;
    /// a failed run is retried by the next caller.
    pub async fn init(&self) -> Result<(), StorageError> {
        self.initialized
            .get_or_try_init(|| async { self.engine.init().await })
            .await
            .map(|_| ())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Write `data` under `(collection, id)`, replacing any previous record.
    pub async fn set<T>(
        &self,
        collection: Collection,
        id: &str,
        data: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>
    where
        T: Serialize + ?Sized,
    {
        self.init().await?;
        let item = StoredItem::new(id, serde_json::to_value(data)?, ttl);
        self.engine.put(collection, &item).await
    }

    /// Write a prebuilt envelope verbatim.
    pub async fn put_item(&self, collection: Collection, item: &StoredItem) -> Result<(), StorageError> {
        self.init().await?;
        self.engine.put(collection, item).await
    }

    /// Read one record; `None` when missing or expired (expired records are deleted).
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.get_item(collection, id).await? {
            Some(item) => Ok(Some(serde_json::from_value(item.data)?)),
            None => Ok(None),
        }
    }

    /// Read one envelope, applying the same expiry rule as [`get`](Self::get).
    pub async fn get_item(&self, collection: Collection, id: &str) -> Result<Option<StoredItem>, StorageError> {
        self.init().await?;
        let Some(item) = self.engine.get(collection, id).await? else {
            return Ok(None);
        };

        if item.is_expired_at(now_millis()) {
            debug!(collection = %collection, id = %id, "Expired record evicted on read");
            self.engine.delete(collection, id).await?;
            return Ok(None);
        }
        Ok(Some(item))
    }

    /// Every live record in a collection.
    pub async fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StorageError> {
        self.get_all_items(collection)
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item.data).map_err(StorageError::from))
            .collect()
    }

    /// Every live envelope in a collection; expired ones are deleted.
    pub async fn get_all_items(&self, collection: Collection) -> Result<Vec<StoredItem>, StorageError> {
        self.init().await?;
        let now = now_millis();
        let (live, expired): (Vec<StoredItem>, Vec<StoredItem>) = self
            .engine
            .scan(collection)
            .await?
            .into_iter()
            .partition(|item| !item.is_expired_at(now));

        if !expired.is_empty() {
            let ids: Vec<String> = expired.into_iter().map(|item| item.id).collect();
            debug!(collection = %collection, expired = ids.len(), "Expired records evicted on scan");
            self.engine.delete_batch(collection, &ids).await?;
        }
        Ok(live)
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), StorageError> {
        self.init().await?;
        self.engine.delete(collection, id).await
    }

    pub async fn clear(&self, collection: Collection) -> Result<(), StorageError> {
        self.init().await?;
        self.engine.clear(collection).await
    }

    /// Delete expired records, returning how many were removed.
    pub async fn clear_expired(&self, collection: Collection) -> Result<usize, StorageError> {
        self.init().await?;
        self.engine.delete_expired(collection, now_millis()).await
    }

    /// Number of stored records, including ones not yet lazily expired.
    pub async fn count(&self, collection: Collection) -> Result<u64, StorageError> {
        self.init().await?;
        self.engine.count(collection).await
    }
}
