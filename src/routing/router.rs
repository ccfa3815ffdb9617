// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Source Router
//!
//! Picks upstream sources for a logical request, tries them one at a time,
//! and keeps per-source latency, error and circuit state.
//!
//! # Flow
//!
//! ```text
//! route_request(service, request)
//!       │
//!       ▼
//! route table ─→ candidate ids ─→ drop open circuits ─→ order by strategy
//!       │
//!       ▼
//! for each candidate (sequential):
//!     request.call(id) with per-attempt timeout
//!       ├─ Ok  → latency EWMA, error count -1, return
//!       └─ Err → latency EWMA, error count +1 (may open circuit), next
//!       │
//!       ▼
//! all failed → fallback (if given) → else last error
//! no route    → NoRoute, fallback never runs
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::types::{DataSource, RouteError, RouteTable, RoutingStrategy, ServiceType, SourceError};
use crate::clock::now_millis;
use crate::config::{RouterConfig, SourceConfig};
use crate::health::{Alert, AlertBus, AlertLevel, HealthMonitor, PerformanceMetric};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitState};

/// Smoothing weight for the latency moving average.
const LATENCY_WEIGHT: f64 = 0.5;

/// A request that can be sent to any source by id.
///
/// Closures `Fn(String) -> impl Future<Output = Result<T, SourceError>>` implement it.
pub trait SourceRequest: Send + Sync {
    type Output: Send;

    fn call(&self, source_id: String) -> impl Future<Output = Result<Self::Output, SourceError>> + Send;
}

impl<F, Fut, T> SourceRequest for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, SourceError>> + Send,
    T: Send,
{
    type Output = T;

    fn call(&self, source_id: String) -> impl Future<Output = Result<T, SourceError>> + Send {
        (self)(source_id)
    }
}

/// Lightweight reachability check used by the periodic health task.
#[async_trait]
pub trait SourceProbe: Send + Sync {
    async fn probe(&self, source_id: &str) -> Result<(), SourceError>;
}

#[derive(Default)]
struct SourceStats {
    response_time_ms: Option<f64>,
    last_health_check: Option<i64>,
    last_error: Option<SourceError>,
    /// Router-wide sequence number of `last_error`
    last_error_seq: u64,
}

struct SourceSlot {
    config: SourceConfig,
    circuit: CircuitBreaker,
    stats: Mutex<SourceStats>,
}

impl SourceSlot {
    fn observe_latency(&self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock();
        stats.response_time_ms = Some(match stats.response_time_ms {
            Some(prev) => prev * (1.0 - LATENCY_WEIGHT) + ms * LATENCY_WEIGHT,
            None => ms,
        });
    }

    fn response_time_ms(&self) -> f64 {
        self.stats.lock().response_time_ms.unwrap_or(0.0)
    }

    fn snapshot(&self) -> DataSource {
        let stats = self.stats.lock();
        let circuit = self.circuit.state();
        DataSource {
            id: self.config.id.clone(),
            name: self.config.name.clone(),
            priority: self.config.priority,
            is_available: circuit != CircuitState::Open,
            last_health_check: stats.last_health_check,
            response_time_ms: stats.response_time_ms.unwrap_or(0.0),
            error_count: self.circuit.error_count(),
            max_errors: self.config.max_errors,
            circuit,
            last_error: stats.last_error.as_ref().map(ToString::to_string),
        }
    }
}

pub struct SourceRouter {
    sources: Vec<SourceSlot>,
    routes: RouteTable,
    strategy: RoutingStrategy,
    request_timeout: Option<Duration>,
    health_check_interval: Duration,
    rotation: AtomicUsize,
    error_seq: AtomicU64,
    monitor: Arc<HealthMonitor>,
    alerts: Arc<AlertBus>,
}

impl SourceRouter {
    pub fn new(config: &RouterConfig, monitor: Arc<HealthMonitor>, alerts: Arc<AlertBus>) -> Self {
        let sources: Vec<SourceSlot> = config
            .sources
            .iter()
            .map(|source| SourceSlot {
                circuit: CircuitBreaker::new(
                    source.id.clone(),
                    CircuitConfig {
                        failure_threshold: source.max_errors.max(1),
                        recovery_timeout: config.cooldown(),
                    },
                ),
                config: source.clone(),
                stats: Mutex::new(SourceStats::default()),
            })
            .collect();

        for (service, ids) in &config.routes {
            for id in ids {
                if !sources.iter().any(|s| &s.config.id == id) {
                    warn!(service = %service, source = %id, "Route references unknown source, it will be skipped");
                }
            }
        }

        Self {
            sources,
            routes: RouteTable::new(config.routes.clone()),
            strategy: config.strategy,
            request_timeout: config.request_timeout(),
            health_check_interval: config.health_check_interval(),
            rotation: AtomicUsize::new(0),
            error_seq: AtomicU64::new(0),
            monitor,
            alerts,
        }
    }

    fn slot(&self, id: &str) -> Option<&SourceSlot> {
        self.sources.iter().find(|s| s.config.id == id)
    }

    #[must_use]
    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    /// Snapshot of every configured source.
    pub fn sources(&self) -> Vec<DataSource> {
        self.sources.iter().map(SourceSlot::snapshot).collect()
    }

    pub fn source(&self, id: &str) -> Option<DataSource> {
        self.slot(id).map(SourceSlot::snapshot)
    }

    /// Available candidates for `service`, in attempt order.
    pub fn candidates(&self, service: ServiceType) -> Result<Vec<String>, RouteError> {
        let ids = self.routes.candidates(service).ok_or(RouteError::NoRoute(service))?;
        Ok(self.ordered(ids).into_iter().map(|s| s.config.id.clone()).collect())
    }

    fn ordered(&self, ids: &[String]) -> Vec<&SourceSlot> {
        let mut candidates: Vec<&SourceSlot> = ids
            .iter()
            .filter_map(|id| self.slot(id))
            .filter(|s| s.circuit.is_available())
            .collect();

        match self.strategy {
            RoutingStrategy::Priority => candidates.sort_by_key(|s| s.config.priority),
            RoutingStrategy::LeastResponseTime => candidates.sort_by(|a, b| {
                a.response_time_ms()
                    .total_cmp(&b.response_time_ms())
                    .then(a.config.priority.cmp(&b.config.priority))
            }),
            RoutingStrategy::RoundRobin => {
                if !candidates.is_empty() {
                    let start = self.rotation.fetch_add(1, Ordering::Relaxed) % candidates.len();
                    candidates.rotate_left(start);
                }
            }
        }
        candidates
    }

    /// The most recently recorded error among `ids`.
    fn last_recorded_error(&self, ids: &[String]) -> Option<RouteError> {
        ids.iter()
            .filter_map(|id| self.slot(id))
            .filter_map(|s| {
                let stats = s.stats.lock();
                stats
                    .last_error
                    .clone()
                    .map(|e| (stats.last_error_seq, s.config.id.clone(), e))
            })
            .max_by_key(|(seq, _, _)| *seq)
            .map(|(_, source_id, error)| RouteError::SourceFailed { source_id, error })
    }

    /// Try each available candidate in order until one succeeds.
    ///
    /// When every candidate fails, or none is available, returns the most
    /// recent source error rather than a generic one.
    pub async fn route_request<R: SourceRequest>(
        &self,
        service: ServiceType,
        request: &R,
    ) -> Result<R::Output, RouteError> {
        let ids = self.routes.candidates(service).ok_or(RouteError::NoRoute(service))?;
        let candidates = self.ordered(ids);
        if candidates.is_empty() {
            debug!(service = %service, "No available sources");
            return Err(self
                .last_recorded_error(ids)
                .unwrap_or(RouteError::NoSourcesAvailable { service }));
        }

        let mut last_error = None;
        for slot in candidates {
            // A concurrent call may have opened this circuit since ordering
            if !slot.circuit.is_available() {
                continue;
            }
            match self.attempt(service, slot, request).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    last_error = Some(RouteError::SourceFailed {
                        source_id: slot.config.id.clone(),
                        error,
                    });
                }
            }
        }

        Err(last_error
            .or_else(|| self.last_recorded_error(ids))
            .unwrap_or(RouteError::NoSourcesAvailable { service }))
    }

    /// [`route_request`](Self::route_request), then `fallback` if every
    /// candidate failed or none was available. The fallback's result or
    /// error becomes the call's result. A service with no route is a
    /// configuration error and is returned as is.
    pub async fn route_request_with_fallback<R, F, Fut>(
        &self,
        service: ServiceType,
        request: &R,
        fallback: F,
    ) -> Result<R::Output, RouteError>
    where
        R: SourceRequest,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<R::Output, SourceError>> + Send,
    {
        match self.route_request(service, request).await {
            Ok(value) => Ok(value),
            Err(e @ RouteError::NoRoute(_)) => Err(e),
            Err(e) => {
                info!(service = %service, error = %e, "All sources failed, using fallback");
                crate::metrics::record_route_fallback(service.as_str());
                fallback().await.map_err(RouteError::FallbackFailed)
            }
        }
    }

    async fn attempt<R: SourceRequest>(
        &self,
        service: ServiceType,
        slot: &SourceSlot,
        request: &R,
    ) -> Result<R::Output, SourceError> {
        let source_id = slot.config.id.as_str();
        let start = Instant::now();
        let call = request.call(source_id.to_string());
        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout {
                    source_id: source_id.to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => call.await,
        };
        let elapsed = start.elapsed();
        slot.observe_latency(elapsed);

        match outcome {
            Ok(value) => {
                slot.circuit.record_success();
                crate::metrics::record_route_attempt(source_id, "success", elapsed);
                self.monitor
                    .record_metric(PerformanceMetric::success(source_id, service.as_str(), elapsed));
                debug!(service = %service, source = %source_id, elapsed_ms = elapsed.as_millis() as u64, "Source answered");
                Ok(value)
            }
            Err(error) => {
                let outcome = if matches!(error, SourceError::Timeout { .. }) { "timeout" } else { "error" };
                crate::metrics::record_route_attempt(source_id, outcome, elapsed);
                self.monitor.record_metric(PerformanceMetric::failure(
                    source_id,
                    service.as_str(),
                    elapsed,
                    error.to_string(),
                ));
                {
                    let mut stats = slot.stats.lock();
                    stats.last_error = Some(error.clone());
                    stats.last_error_seq = self.error_seq.fetch_add(1, Ordering::Relaxed) + 1;
                }
                warn!(service = %service, source = %source_id, error = %error, "Source attempt failed");

                if slot.circuit.record_failure() {
                    self.alerts.notify(
                        Alert::new(
                            AlertLevel::Error,
                            "Source circuit opened",
                            format!(
                                "{} excluded from routing after {} errors",
                                slot.config.name, slot.config.max_errors
                            ),
                        )
                        .for_service(source_id),
                    );
                }
                Err(error)
            }
        }
    }

    /// Probe one source. A success closes a half-open circuit; an open one
    /// stays open until its cool-down elapses. The result is also reported
    /// to the health monitor as a synthetic metric. Returns whether the
    /// probe succeeded.
    pub async fn check_source(&self, probe: &dyn SourceProbe, id: &str) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        let start = Instant::now();
        let result = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, probe.probe(id))
                .await
                .unwrap_or_else(|_| {
                    Err(SourceError::Timeout {
                        source_id: id.to_string(),
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }),
            None => probe.probe(id).await,
        };
        let elapsed = start.elapsed();
        slot.stats.lock().last_health_check = Some(now_millis());

        match result {
            Ok(()) => {
                self.monitor
                    .record_metric(PerformanceMetric::success(id, "health_check", elapsed));
                let was = slot.circuit.state();
                slot.circuit.record_probe_success();
                if was == CircuitState::HalfOpen {
                    self.alerts.notify(
                        Alert::new(AlertLevel::Success, "Source restored", format!("{} is back in rotation", slot.config.name))
                            .for_service(id),
                    );
                }
                true
            }
            Err(e) => {
                debug!(source = %id, error = %e, "Probe failed");
                self.monitor
                    .record_metric(PerformanceMetric::failure(id, "health_check", elapsed, e.to_string()));
                if slot.circuit.record_probe_failure() {
                    self.alerts.notify(
                        Alert::new(AlertLevel::Warning, "Source still failing", format!("{}: {e}", slot.config.name))
                            .for_service(id),
                    );
                }
                false
            }
        }
    }

    /// Probe every source once, in configuration order.
    #[tracing::instrument(skip_all)]
    pub async fn run_health_checks(&self, probe: &dyn SourceProbe) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.sources.len());
        for slot in &self.sources {
            let ok = self.check_source(probe, &slot.config.id).await;
            results.push((slot.config.id.clone(), ok));
        }
        results
    }

    /// Periodic probe task on the configured interval.
    pub fn spawn_health_checks(self: &Arc<Self>, probe: Arc<dyn SourceProbe>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let every = self.health_check_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                router.run_health_checks(probe.as_ref()).await;
            }
        })
    }

    /// Force a source's circuit closed and forget its last error (operator action).
    pub fn reset_source(&self, id: &str) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        slot.circuit.reset();
        let mut stats = slot.stats.lock();
        stats.last_error = None;
        stats.last_error_seq = 0;
        info!(source = %id, "Source reset");
        true
    }
}
