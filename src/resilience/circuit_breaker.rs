// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-source circuit breaker.
//!
//! An explicit state machine driven by the router's attempt outcomes and the
//! periodic reachability probe:
//!
//! ```text
//!            errors >= threshold                cool-down elapsed
//!  Closed ───────────────────────→ Open ─────────────────────────→ HalfOpen
//!    ↑                              ↑                                  │
//!    │        request/probe failure │                                  │
//!    │                              └──────────────────────────────────┤
//!    └─────────────────────────────────────────────────────────────────┘
//!                       request/probe success
//! ```
//!
//! A successful request in `Closed` decrements the error count (floored at
//! zero), so a source recovers gradually. A probe success while `Open` does
//! nothing: the cool-down always has to elapse first.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state for metrics/monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Error count at which the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before a half-open trial
    pub recovery_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(300),
        }
    }
}

impl CircuitConfig {
    /// Trips fast, for the primary backend
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(300),
        }
    }

    /// Tolerates more failures, for secondary providers
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(120),
        }
    }

    /// Fast recovery for testing
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
        }
    }
}

struct Inner {
    state: CircuitState,
    error_count: u32,
    opened_at: Option<Instant>,
}

/// A named circuit breaker with metrics tracking
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    inner: Mutex<Inner>,

    // Metrics
    successes: AtomicU64,
    failures: AtomicU64,
    trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        let name = name.into();
        crate::metrics::set_circuit_state(&name, CircuitState::Closed as u8);
        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                error_count: 0,
                opened_at: None,
            }),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            trips: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Current state. An open circuit whose cool-down has elapsed moves to
    /// half-open here, with the error count reset.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Whether the router may send requests through this circuit.
    pub fn is_available(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn error_count(&self) -> u32 {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        inner.error_count
    }

    /// Time left before an open circuit goes half-open.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) => {
                Some(self.config.recovery_timeout.saturating_sub(at.elapsed()))
            }
            _ => None,
        }
    }

    fn advance(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let cooled = inner
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout);
        if cooled {
            info!(source = %self.name, "Cool-down elapsed, circuit half-open");
            self.transition(inner, CircuitState::HalfOpen);
            inner.error_count = 0;
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        debug!(source = %self.name, from = %inner.state, to = %to, "Circuit transition");
        inner.state = to;
        inner.opened_at = (to == CircuitState::Open).then(Instant::now);
        crate::metrics::set_circuit_state(&self.name, to as u8);
    }

    fn trip(&self, inner: &mut Inner) {
        self.transition(inner, CircuitState::Open);
        self.trips.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_circuit_trip(&self.name);
        warn!(
            source = %self.name,
            errors = inner.error_count,
            cooldown_secs = self.config.recovery_timeout.as_secs(),
            "Circuit opened"
        );
    }

    /// A routed request succeeded.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        match inner.state {
            CircuitState::Closed => inner.error_count = inner.error_count.saturating_sub(1),
            CircuitState::HalfOpen => {
                info!(source = %self.name, "Trial request succeeded, circuit closed");
                self.transition(&mut inner, CircuitState::Closed);
                inner.error_count = 0;
            }
            // Request raced the trip; the cool-down still applies
            CircuitState::Open => {}
        }
    }

    /// A routed request failed. Returns `true` if this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.error_count += 1;
                if inner.error_count >= self.config.failure_threshold {
                    self.trip(&mut inner);
                    return true;
                }
                false
            }
            CircuitState::HalfOpen => {
                inner.error_count += 1;
                self.trip(&mut inner);
                true
            }
            CircuitState::Open => false,
        }
    }

    /// A reachability probe succeeded. Closes a half-open circuit only.
    pub fn record_probe_success(&self) {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        if inner.state == CircuitState::HalfOpen {
            info!(source = %self.name, "Probe succeeded, circuit closed");
            self.transition(&mut inner, CircuitState::Closed);
            inner.error_count = 0;
        }
    }

    /// A reachability probe failed. Reopens a half-open circuit; a closed
    /// circuit's error count is left alone. Returns `true` if it reopened.
    pub fn record_probe_failure(&self) -> bool {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        if inner.state == CircuitState::HalfOpen {
            self.trip(&mut inner);
            return true;
        }
        false
    }

    /// Force closed with a clean error count (operator action).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
        inner.error_count = 0;
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Get failure rate (0.0 - 1.0)
    pub fn failure_rate(&self) -> f64 {
        let failures = self.failures();
        let total = failures + self.successes();
        if total == 0 {
            return 0.0;
        }
        failures as f64 / total as f64
    }
}
