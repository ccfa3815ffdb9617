// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;

use crate::clock::now_millis;

/// Volatile tier envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Insert time (epoch millis)
    pub timestamp: i64,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now_millis(),
            ttl,
        }
    }

    /// Valid iff `now - timestamp < ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(self.timestamp) < ttl_ms
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: i64, ttl_ms: u64) -> CacheEntry<&'static str> {
        CacheEntry {
            data: "p1",
            timestamp,
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    #[test]
    fn test_valid_inside_ttl() {
        let e = entry(10_000, 1_000);
        assert!(e.is_valid_at(10_000));
        assert!(e.is_valid_at(10_999));
    }

    #[test]
    fn test_expired_at_and_after_ttl() {
        let e = entry(10_000, 1_000);
        assert!(!e.is_valid_at(11_000));
        assert!(!e.is_valid_at(11_001));
    }

    #[test]
    fn test_zero_ttl_is_never_valid() {
        let e = entry(10_000, 0);
        assert!(!e.is_valid_at(10_000));
    }

    #[test]
    fn test_fresh_entry_is_valid() {
        assert!(CacheEntry::new(1u8, Duration::from_secs(60)).is_valid());
    }
}
