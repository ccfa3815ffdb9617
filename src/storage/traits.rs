// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::clock::now_millis;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),
}

/// Fixed set of partitions in the durable local store.
///
/// Collections are pre-declared; nothing creates them at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Places,
    Restaurants,
    GroceryStores,
    SearchResults,
    UserPreferences,
    OfflineQueue,
    DeadLetters,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Places,
        Collection::Restaurants,
        Collection::GroceryStores,
        Collection::SearchResults,
        Collection::UserPreferences,
        Collection::OfflineQueue,
        Collection::DeadLetters,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Places => "places",
            Self::Restaurants => "restaurants",
            Self::GroceryStores => "grocery_stores",
            Self::SearchResults => "search_results",
            Self::UserPreferences => "user_preferences",
            Self::OfflineQueue => "offline_queue",
            Self::DeadLetters => "dead_letters",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StorageError::UnknownCollection(s.to_string()))
    }
}

/// On-disk envelope for one record. Unique by `(collection, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    pub data: Value,
    /// Write time (epoch millis)
    pub timestamp: i64,
    /// Absolute expiry (epoch millis); `None` never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StoredItem {
    /// Build an envelope stamped with the current time.
    pub fn new(id: impl Into<String>, data: Value, ttl: Option<Duration>) -> Self {
        let timestamp = now_millis();
        Self {
            id: id.into(),
            data,
            timestamp,
            expires_at: ttl.map(|t| timestamp.saturating_add(i64::try_from(t.as_millis()).unwrap_or(i64::MAX))),
        }
    }

    /// Expired strictly after `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

/// Persistent key-value engine behind the durable local store.
///
/// Engines store envelopes verbatim; expiry filtering happens in
/// [`LocalStore`](super::local::LocalStore). Any engine error is returned
/// to the caller unchanged.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Prepare the engine (open files, create schema). Must be idempotent.
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&self, collection: Collection, item: &StoredItem) -> Result<(), StorageError>;
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredItem>, StorageError>;
    async fn scan(&self, collection: Collection) -> Result<Vec<StoredItem>, StorageError>;
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StorageError>;
    async fn clear(&self, collection: Collection) -> Result<(), StorageError>;
    async fn count(&self, collection: Collection) -> Result<u64, StorageError>;

    /// Delete several ids. Default implementation falls back to sequential deletes.
    async fn delete_batch(&self, collection: Collection, ids: &[String]) -> Result<usize, StorageError> {
        for id in ids {
            self.delete(collection, id).await?;
        }
        Ok(ids.len())
    }

    /// Remove every record in `collection` whose expiry is before `now`.
    /// Default implementation scans and batch-deletes.
    async fn delete_expired(&self, collection: Collection, now: i64) -> Result<usize, StorageError> {
        let expired: Vec<String> = self
            .scan(collection)
            .await?
            .into_iter()
            .filter(|item| item.is_expired_at(now))
            .map(|item| item.id)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }
        self.delete_batch(collection, &expired).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_round_trips_through_str() {
        for c in Collection::ALL {
            assert_eq!(c.as_str().parse::<Collection>().unwrap(), c);
        }
        assert!(matches!(
            "pizzas".parse::<Collection>(),
            Err(StorageError::UnknownCollection(name)) if name == "pizzas"
        ));
    }

    #[test]
    fn test_stored_item_expiry_boundary() {
        let item = StoredItem {
            id: "p1".into(),
            data: json!({}),
            timestamp: 1_000,
            expires_at: Some(2_000),
        };
        assert!(!item.is_expired_at(1_999));
        assert!(!item.is_expired_at(2_000));
        assert!(item.is_expired_at(2_001));
    }

    #[test]
    fn test_stored_item_without_ttl_never_expires() {
        let item = StoredItem::new("p1", json!({"id": "p1"}), None);
        assert!(item.expires_at.is_none());
        assert!(!item.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_stored_item_ttl_sets_expiry() {
        let item = StoredItem::new("p1", json!(1), Some(Duration::from_secs(10)));
        assert_eq!(item.expires_at, Some(item.timestamp + 10_000));
    }

    #[test]
    fn test_stored_item_huge_ttl_saturates() {
        let item = StoredItem::new("p1", json!(1), Some(Duration::MAX));
        assert_eq!(item.expires_at, Some(i64::MAX));
        assert!(!item.is_expired());

        let item = StoredItem::new("p1", json!(1), Some(Duration::from_millis(i64::MAX as u64)));
        assert_eq!(item.expires_at, Some(i64::MAX));
        assert!(!item.is_expired());
    }
}
