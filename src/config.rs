// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the data-access core.
//!
//! # Example
//!
//! ```
//! use locus_core::LocusConfig;
//! use locus_core::routing::RoutingStrategy;
//!
//! // Minimal config (uses defaults)
//! let config = LocusConfig::default();
//! assert_eq!(config.cache.memory_ttl_ms, 60_000);
//! assert_eq!(config.router.cooldown_secs, 300);
//!
//! // Partial override from JSON, everything else defaulted
//! let config: LocusConfig = serde_json::from_str(r#"{
//!     "store_path": "./locus.db",
//!     "router": { "strategy": "least_response_time" },
//!     "queue": { "max_retries": 3 }
//! }"#).unwrap();
//! assert_eq!(config.router.strategy, RoutingStrategy::LeastResponseTime);
//! assert_eq!(config.queue.max_retries, 3);
//! assert_eq!(config.queue.max_delay_ms, 60_000);
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::resilience::retry::RetryConfig;
use crate::routing::{RoutingStrategy, ServiceType};

/// Top-level configuration.
///
/// Every section is optional when deserializing; missing fields take the
/// defaults documented on each section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocusConfig {
    /// SQLite file for the durable local store (default: `./locus_store.db`)
    #[serde(default)]
    pub store_path: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl LocusConfig {
    /// Resolved store path.
    #[must_use]
    pub fn store_path(&self) -> String {
        self.store_path
            .clone()
            .unwrap_or_else(|| "./locus_store.db".to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

/// Tiered cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Volatile tier capacity in entries (oldest inserted is evicted when full)
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,

    /// Volatile tier TTL (default: 60s)
    #[serde(default = "default_memory_ttl_ms")]
    pub memory_ttl_ms: u64,

    /// Durable tier TTL (default: 24h)
    #[serde(default = "default_durable_ttl_ms")]
    pub durable_ttl_ms: u64,

    /// Single-flight concurrent misses on the same key
    #[serde(default = "default_true")]
    pub coalesce_misses: bool,
}

fn default_memory_max_entries() -> usize { 1000 }
fn default_memory_ttl_ms() -> u64 { 60_000 }
fn default_durable_ttl_ms() -> u64 { 24 * 60 * 60 * 1000 }
fn default_true() -> bool { true }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_entries: default_memory_max_entries(),
            memory_ttl_ms: default_memory_ttl_ms(),
            durable_ttl_ms: default_durable_ttl_ms(),
            coalesce_misses: true,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn memory_ttl(&self) -> Duration {
        Duration::from_millis(self.memory_ttl_ms)
    }

    #[must_use]
    pub fn durable_ttl(&self) -> Duration {
        Duration::from_millis(self.durable_ttl_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════

/// One upstream data source known to the router.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    /// Lower number = tried first under the `priority` strategy
    pub priority: u32,
    /// Consecutive-ish failures before the circuit opens
    pub max_errors: u32,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: u32, max_errors: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            max_errors,
        }
    }
}

/// Source router settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub strategy: RoutingStrategy,

    /// Reachability probe interval (default: 60s)
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// How long an open circuit stays open (default: 5 minutes)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Per-attempt timeout, 0 = unbounded (default: 10s)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Service type → ordered candidate source ids
    #[serde(default = "default_routes")]
    pub routes: HashMap<ServiceType, Vec<String>>,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

fn default_health_check_interval_secs() -> u64 { 60 }
fn default_cooldown_secs() -> u64 { 300 }
fn default_request_timeout_ms() -> u64 { 10_000 }

fn default_routes() -> HashMap<ServiceType, Vec<String>> {
    let both = || vec!["backend".to_string(), "maps".to_string()];
    HashMap::from([
        (ServiceType::Places, both()),
        (ServiceType::Restaurants, both()),
        (ServiceType::GroceryStores, both()),
        (ServiceType::Search, both()),
        (ServiceType::Geocoding, vec!["maps".to_string()]),
        (ServiceType::UserData, vec!["backend".to_string()]),
    ])
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("backend", "Remote backend", 1, 3),
        SourceConfig::new("maps", "Mapping provider", 2, 5),
    ]
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            health_check_interval_secs: default_health_check_interval_secs(),
            cooldown_secs: default_cooldown_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            routes: default_routes(),
            sources: default_sources(),
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE QUEUE
// ═══════════════════════════════════════════════════════════════════════════

/// Offline retry queue settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Default `max_retries` stamped on new requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Periodic drain while online (default: 30s)
    #[serde(default = "default_process_interval_secs")]
    pub process_interval_secs: u64,

    /// Keep a record of requests dropped after exhausting retries
    #[serde(default = "default_true")]
    pub dead_letter: bool,
}

fn default_max_retries() -> u32 { 5 }
fn default_base_delay_ms() -> u64 { 1000 }
fn default_max_delay_ms() -> u64 { 60_000 }
fn default_process_interval_secs() -> u64 { 30 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            process_interval_secs: default_process_interval_secs(),
            dead_letter: true,
        }
    }
}

impl QueueConfig {
    /// Backoff policy for replays: `min(base * 2^n, max)`.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            factor: 2.0,
            max_retries: Some(self.max_retries as usize),
        }
    }

    #[must_use]
    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(self.process_interval_secs.max(1))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HEALTH MONITOR
// ═══════════════════════════════════════════════════════════════════════════

/// Health monitor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Number of most recent metrics used for error rate / average latency
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// A health check still pending after this counts as failed
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,

    /// Metrics older than this are pruned (default: 1h)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Hard cap on retained metrics per service between prunes
    #[serde(default = "default_max_history_per_service")]
    pub max_history_per_service: usize,

    #[serde(default = "default_degraded_error_rate")]
    pub degraded_error_rate: f64,

    #[serde(default = "default_unhealthy_error_rate")]
    pub unhealthy_error_rate: f64,

    #[serde(default = "default_degraded_response_ms")]
    pub degraded_response_ms: f64,

    #[serde(default = "default_unhealthy_response_ms")]
    pub unhealthy_response_ms: f64,
}

fn default_window_size() -> usize { 100 }
fn default_check_interval_secs() -> u64 { 60 }
fn default_check_timeout_ms() -> u64 { 10_000 }
fn default_prune_interval_secs() -> u64 { 3600 }
fn default_retention_secs() -> u64 { 3600 }
fn default_max_history_per_service() -> usize { 5000 }
fn default_degraded_error_rate() -> f64 { 0.2 }
fn default_unhealthy_error_rate() -> f64 { 0.5 }
fn default_degraded_response_ms() -> f64 { 5_000.0 }
fn default_unhealthy_response_ms() -> f64 { 10_000.0 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            check_interval_secs: default_check_interval_secs(),
            check_timeout_ms: default_check_timeout_ms(),
            prune_interval_secs: default_prune_interval_secs(),
            retention_secs: default_retention_secs(),
            max_history_per_service: default_max_history_per_service(),
            degraded_error_rate: default_degraded_error_rate(),
            unhealthy_error_rate: default_unhealthy_error_rate(),
            degraded_response_ms: default_degraded_response_ms(),
            unhealthy_response_ms: default_unhealthy_response_ms(),
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    #[must_use]
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms.max(1))
    }

    #[must_use]
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}
