// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Volatile in-process tier.
//!
//! Bounded by entry count with oldest-insertion eviction. Expired entries
//! are dropped lazily when read.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::entry::CacheEntry;
use crate::clock::now_millis;

struct Inner {
    entries: HashMap<String, CacheEntry<Value>>,
    /// Insertion order for eviction (oldest first)
    order: VecDeque<String>,
}

impl Inner {
    fn forget(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.retain(|k| k != key);
        }
        removed
    }
}

pub struct VolatileTier {
    inner: Mutex<Inner>,
    max_entries: usize,
}

impl VolatileTier {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, now_millis())
    }

    pub(crate) fn get_at(&self, key: &str, now: i64) -> Option<Value> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get(key)?;
        if entry.is_valid_at(now) {
            return Some(entry.data.clone());
        }
        inner.forget(key);
        None
    }

    /// Insert or replace. A replaced key moves to the back of the eviction order.
    pub fn insert(&self, key: &str, data: Value, ttl: Duration) {
        self.insert_entry(key, CacheEntry::new(data, ttl));
    }

    pub(crate) fn insert_entry(&self, key: &str, entry: CacheEntry<Value>) {
        if self.max_entries == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.forget(key);

        while inner.entries.len() >= self.max_entries {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.entries.insert(key.to_string(), entry);
        inner.order.push_back(key.to_string());
        crate::metrics::set_memory_tier_entries(inner.entries.len());
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().forget(key)
    }

    /// Drop every key starting with `prefix`, returning how many went.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !k.starts_with(prefix));
        inner.order.retain(|k| !k.starts_with(prefix));
        before - inner.entries.len()
    }

    /// Drop expired entries under `prefix`.
    pub fn purge_expired(&self, prefix: &str) -> usize {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|k, e| !k.starts_with(prefix) || e.is_valid_at(now));
        let Inner { entries, order } = &mut *inner;
        order.retain(|k| entries.contains_key(k));
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_insert_and_get() {
        let tier = VolatileTier::new(10);
        tier.insert("places:p1", json!({"id": "p1"}), MINUTE);
        assert_eq!(tier.get("places:p1"), Some(json!({"id": "p1"})));
        assert_eq!(tier.get("places:p2"), None);
    }

    #[test]
    fn test_evicts_oldest_insert_when_full() {
        let tier = VolatileTier::new(3);
        for i in 0..3 {
            tier.insert(&format!("k{i}"), json!(i), MINUTE);
        }
        // Reading k0 does not refresh its position
        assert!(tier.get("k0").is_some());

        tier.insert("k3", json!(3), MINUTE);
        assert_eq!(tier.len(), 3);
        assert!(tier.get("k0").is_none());
        assert!(tier.get("k1").is_some());
        assert!(tier.get("k3").is_some());
    }

    #[test]
    fn test_reinsert_moves_to_back() {
        let tier = VolatileTier::new(2);
        tier.insert("a", json!(1), MINUTE);
        tier.insert("b", json!(2), MINUTE);
        tier.insert("a", json!(10), MINUTE);
        tier.insert("c", json!(3), MINUTE);

        assert!(tier.get("b").is_none());
        assert_eq!(tier.get("a"), Some(json!(10)));
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let tier = VolatileTier::new(10);
        tier.insert_entry(
            "places:p1",
            CacheEntry {
                data: json!(1),
                timestamp: 1_000,
                ttl: Duration::from_millis(100),
            },
        );
        assert_eq!(tier.get_at("places:p1", 1_099), Some(json!(1)));
        assert_eq!(tier.get_at("places:p1", 1_101), None);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_remove_prefix_only_touches_collection() {
        let tier = VolatileTier::new(10);
        tier.insert("places:p1", json!(1), MINUTE);
        tier.insert("places:p2", json!(2), MINUTE);
        tier.insert("restaurants:r1", json!(3), MINUTE);

        assert_eq!(tier.remove_prefix("places:"), 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("restaurants:r1").is_some());
    }

    #[test]
    fn test_purge_expired_keeps_live_entries() {
        let tier = VolatileTier::new(10);
        tier.insert_entry(
            "places:old",
            CacheEntry { data: json!(1), timestamp: 0, ttl: Duration::from_millis(1) },
        );
        tier.insert("places:new", json!(2), MINUTE);

        assert_eq!(tier.purge_expired("places:"), 1);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("places:new").is_some());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let tier = VolatileTier::new(0);
        tier.insert("k", json!(1), MINUTE);
        assert!(tier.is_empty());
        assert_eq!(tier.capacity(), 0);
    }
}
