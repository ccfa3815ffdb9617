// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite engine for the durable local store.
//!
//! One table holds every collection, keyed by `(collection, id)`:
//! ```sql
//! CREATE TABLE stored_items (
//!   collection TEXT NOT NULL,
//!   id         TEXT NOT NULL,
//!   data       TEXT NOT NULL,    -- JSON payload
//!   timestamp  INTEGER NOT NULL, -- epoch millis of last write
//!   expires_at INTEGER,          -- epoch millis, NULL = never
//!   PRIMARY KEY (collection, id)
//! )
//! ```
//!
//! The pool is opened lazily on first use. Concurrent first callers all await
//! the same initialization, so `init()` may be called any number of times from
//! any number of tasks.

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::traits::{Collection, DurableStore, StorageError, StoredItem};
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

// Keep well under SQLite's bound-parameter limit
const DELETE_CHUNK_SIZE: usize = 500;

pub struct SqlStore {
    url: String,
    path: Option<String>,
    pool: OnceCell<AnyPool>,
}

impl SqlStore {
    /// Create a store for a connection string (e.g. `sqlite://locus.db?mode=rwc`).
    /// Nothing is opened until the first operation or [`DurableStore::init`].
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            url: connection_string.into(),
            path: None,
            pool: OnceCell::new(),
        }
    }

    /// Create a store backed by a SQLite file, created if missing.
    pub fn at_path(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy().to_string();
        Self {
            url: format!("sqlite://{}?mode=rwc", path_str),
            path: Some(path_str),
            pool: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Size of the backing file, when file-backed.
    pub fn file_size_bytes(&self) -> std::io::Result<u64> {
        match &self.path {
            Some(path) => std::fs::metadata(path).map(|m| m.len()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "store is not file-backed",
            )),
        }
    }

    async fn pool(&self) -> Result<&AnyPool, StorageError> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<AnyPool, StorageError> {
        install_drivers();
        info!(url = %self.url, "Opening durable local store");

        let url = self.url.as_str();
        let pool = retry("store_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(url)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Self::enable_wal_mode(&pool).await?;
        Self::init_schema(&pool).await?;
        info!(url = %self.url, "Durable local store ready");
        Ok(pool)
    }

    /// WAL journal: readers don't block the writer, one fsync per commit.
    async fn enable_wal_mode(pool: &AnyPool) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(pool: &AnyPool) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS stored_items (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (collection, id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_stored_items_expiry ON stored_items (collection, expires_at)",
        ];

        for sql in statements {
            retry("store_init_schema", &RetryConfig::startup(), || async {
                sqlx::query(sql)
                    .execute(pool)
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))
            })
            .await?;
        }
        Ok(())
    }

    /// Read a TEXT column as String, falling back to bytes (Any driver quirk).
    fn text_column(row: &AnyRow, name: &str) -> Result<String, StorageError> {
        row.try_get::<String, _>(name)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(name)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .ok_or_else(|| StorageError::Backend(format!("column '{}' is not text", name)))
    }

    fn row_to_item(row: &AnyRow) -> Result<StoredItem, StorageError> {
        let id = Self::text_column(row, "id")?;
        let data = Self::text_column(row, "data")?;
        let timestamp: i64 = row.try_get("timestamp").unwrap_or(0);
        let expires_at = row.try_get::<Option<i64>, _>("expires_at").ok().flatten();

        Ok(StoredItem {
            id,
            data: serde_json::from_str(&data)?,
            timestamp,
            expires_at,
        })
    }
}

#[async_trait]
impl DurableStore for SqlStore {
    async fn init(&self) -> Result<(), StorageError> {
        self.pool().await.map(|_| ())
    }

    async fn put(&self, collection: Collection, item: &StoredItem) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let data = serde_json::to_string(&item.data)?;

        retry("store_put", &RetryConfig::query(), || async {
            sqlx::query(
                "INSERT INTO stored_items (collection, id, data, timestamp, expires_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    data = excluded.data,
                    timestamp = excluded.timestamp,
                    expires_at = excluded.expires_at",
            )
            .bind(collection.as_str())
            .bind(&item.id)
            .bind(&data)
            .bind(item.timestamp)
            .bind(item.expires_at)
            .execute(pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredItem>, StorageError> {
        let pool = self.pool().await?;

        let row = retry("store_get", &RetryConfig::query(), || async {
            sqlx::query(
                "SELECT id, data, timestamp, expires_at FROM stored_items WHERE collection = ? AND id = ?",
            )
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<StoredItem>, StorageError> {
        let pool = self.pool().await?;

        let rows = retry("store_scan", &RetryConfig::query(), || async {
            sqlx::query(
                "SELECT id, data, timestamp, expires_at FROM stored_items WHERE collection = ? ORDER BY id ASC",
            )
            .bind(collection.as_str())
            .fetch_all(pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StorageError> {
        let pool = self.pool().await?;

        retry("store_delete", &RetryConfig::query(), || async {
            sqlx::query("DELETE FROM stored_items WHERE collection = ? AND id = ?")
                .bind(collection.as_str())
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, collection: Collection) -> Result<(), StorageError> {
        let pool = self.pool().await?;

        retry("store_clear", &RetryConfig::query(), || async {
            sqlx::query("DELETE FROM stored_items WHERE collection = ?")
                .bind(collection.as_str())
                .execute(pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok::<_, StorageError>(())
        })
        .await?;

        debug!(collection = %collection, "Collection cleared");
        Ok(())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StorageError> {
        let pool = self.pool().await?;

        let row = retry("store_count", &RetryConfig::query(), || async {
            sqlx::query("SELECT COUNT(*) AS n FROM stored_items WHERE collection = ?")
                .bind(collection.as_str())
                .fetch_one(pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let n: i64 = row
            .try_get("n")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(n.max(0) as u64)
    }

    async fn delete_batch(&self, collection: Collection, ids: &[String]) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let pool = self.pool().await?;
        let mut deleted = 0usize;

        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let sql = format!(
                "DELETE FROM stored_items WHERE collection = ? AND id IN ({})",
                placeholders.join(", ")
            );

            deleted += retry("store_delete_batch", &RetryConfig::query(), || async {
                let mut query = sqlx::query(&sql).bind(collection.as_str());
                for id in chunk {
                    query = query.bind(id);
                }
                let result = query
                    .execute(pool)
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok::<_, StorageError>(result.rows_affected() as usize)
            })
            .await?;
        }

        Ok(deleted)
    }

    async fn delete_expired(&self, collection: Collection, now: i64) -> Result<usize, StorageError> {
        let pool = self.pool().await?;

        retry("store_delete_expired", &RetryConfig::query(), || async {
            let result = sqlx::query(
                "DELETE FROM stored_items WHERE collection = ? AND expires_at IS NOT NULL AND expires_at < ?",
            )
            .bind(collection.as_str())
            .bind(now)
            .execute(pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(result.rows_affected() as usize)
        })
        .await
    }
}
