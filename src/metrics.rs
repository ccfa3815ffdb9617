// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for locus-core.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! These are in addition to the in-process aggregates returned by
//! [`TieredCache::get_metrics`](crate::cache::TieredCache::get_metrics) and
//! [`HealthMonitor::get_service_health`](crate::health::HealthMonitor::get_service_health).
//!
//! # Metric Naming Convention
//! - `locus_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: memory, durable, fetch
//! - `source`: data source id (backend, maps, ...)
//! - `service`: monitored service name
//! - `outcome`: hit, miss, success, error, timeout

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

/// Record a tier lookup outcome
pub fn record_tier_lookup(tier: &str, outcome: &str) {
    counter!(
        "locus_cache_lookups_total",
        "tier" => tier.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record end-to-end latency of a cache `get`
pub fn record_cache_get_latency(collection: &str, duration: Duration) {
    histogram!(
        "locus_cache_get_seconds",
        "collection" => collection.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record fetcher latency on a full miss
pub fn record_fetch_latency(collection: &str, duration: Duration) {
    histogram!(
        "locus_fetch_seconds",
        "collection" => collection.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set current volatile tier entry count
pub fn set_memory_tier_entries(count: usize) {
    gauge!("locus_memory_tier_entries").set(count as f64);
}

/// Record a swallowed cache write-through failure
pub fn record_write_through_error(tier: &str) {
    counter!(
        "locus_cache_write_errors_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Record a miss that waited on another caller's in-flight fetch
pub fn record_coalesced_miss() {
    counter!("locus_cache_coalesced_total").increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUTING
// ═══════════════════════════════════════════════════════════════════════════

/// Record one routed attempt against a source
pub fn record_route_attempt(source: &str, outcome: &str, duration: Duration) {
    counter!(
        "locus_route_attempts_total",
        "source" => source.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "locus_route_attempt_seconds",
        "source" => source.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a call answered by the fallback
pub fn record_route_fallback(service: &str) {
    counter!(
        "locus_route_fallbacks_total",
        "service" => service.to_string()
    )
    .increment(1);
}

/// Record circuit breaker state (0 = Closed, 1 = HalfOpen, 2 = Open)
pub fn set_circuit_state(source: &str, state: u8) {
    gauge!(
        "locus_circuit_state",
        "source" => source.to_string()
    )
    .set(state as f64);
}

/// Record a circuit trip
pub fn record_circuit_trip(source: &str) {
    counter!(
        "locus_circuit_trips_total",
        "source" => source.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE QUEUE
// ═══════════════════════════════════════════════════════════════════════════

/// Set number of requests waiting in the offline queue
pub fn set_queue_depth(count: usize) {
    gauge!("locus_queue_depth").set(count as f64);
}

/// Record a replay attempt outcome
pub fn record_queue_replay(outcome: &str) {
    counter!(
        "locus_queue_replays_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a request dropped after exhausting its retries
pub fn record_queue_drop() {
    counter!("locus_queue_dropped_total").increment(1);
}

/// Record a stored queue record that no longer decodes and was discarded
pub fn record_queue_discard(collection: &str) {
    counter!(
        "locus_queue_discarded_total",
        "collection" => collection.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// HEALTH
// ═══════════════════════════════════════════════════════════════════════════

/// Set service health (0 = Healthy, 1 = Degraded, 2 = Unhealthy)
pub fn set_health_status(service: &str, status: u8) {
    gauge!(
        "locus_health_status",
        "service" => service.to_string()
    )
    .set(status as f64);
}

/// Record an alert emitted to operators
pub fn record_alert(level: &str) {
    counter!(
        "locus_alerts_total",
        "level" => level.to_string()
    )
    .increment(1);
}

/// Record coordinator lifecycle state (0 = Created .. 4 = Stopped)
pub fn set_coordinator_state(state: u8) {
    gauge!("locus_coordinator_state").set(state as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; make sure none panic.
    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_tier_lookup("memory", "hit");
        record_cache_get_latency("places", Duration::from_millis(3));
        record_fetch_latency("places", Duration::from_millis(30));
        set_memory_tier_entries(10);
        record_write_through_error("durable");
        record_coalesced_miss();
        record_route_attempt("backend", "success", Duration::from_millis(12));
        record_route_fallback("places");
        set_circuit_state("backend", 2);
        record_circuit_trip("backend");
        set_queue_depth(3);
        record_queue_replay("success");
        record_queue_drop();
        set_health_status("backend", 1);
        record_alert("warning");
        set_coordinator_state(2);
    }
}
