// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Health Monitor
//!
//! Records per-service latency/success metrics, derives a health status over
//! a rolling window, and raises alerts on transitions. The monitor only
//! reports: it never touches source availability. Recovery is the
//! coordinator's job, driven by the alerts raised here.
//!
//! # Status thresholds (defaults)
//!
//! | Status      | Window error rate | or mean latency |
//! |-------------|-------------------|-----------------|
//! | Unhealthy   | > 50%             | > 10s           |
//! | Degraded    | > 20%             | > 5s            |
//! | Healthy     | otherwise         |                 |

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::alerts::{Alert, AlertBus, AlertLevel};
use super::types::{HealthStatus, PerformanceMetric, PerformanceReport, ServiceHealth};
use crate::clock::now_millis;
use crate::config::MonitorConfig;

/// A proactive liveness check for one service. Errors become failed
/// synthetic metrics; they never propagate.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<(), String>;
}

struct ServiceState {
    history: VecDeque<PerformanceMetric>,
    status: HealthStatus,
    error_rate: f64,
    avg_response_time_ms: f64,
    total_requests: u64,
    last_checked: i64,
    last_error: Option<String>,
}

impl ServiceState {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            status: HealthStatus::Healthy,
            error_rate: 0.0,
            avg_response_time_ms: 0.0,
            total_requests: 0,
            last_checked: 0,
            last_error: None,
        }
    }

    fn snapshot(&self, service: &str) -> ServiceHealth {
        ServiceHealth {
            service: service.to_string(),
            status: self.status,
            error_rate: self.error_rate,
            avg_response_time_ms: self.avg_response_time_ms,
            total_requests: self.total_requests,
            last_checked: self.last_checked,
            last_error: self.last_error.clone(),
        }
    }
}

pub struct HealthMonitor {
    config: MonitorConfig,
    services: Mutex<BTreeMap<String, ServiceState>>,
    checks: RwLock<Vec<(String, Arc<dyn HealthCheck>)>>,
    alerts: Arc<AlertBus>,
}

impl HealthMonitor {
    pub fn new(config: MonitorConfig, alerts: Arc<AlertBus>) -> Self {
        Self {
            config,
            services: Mutex::new(BTreeMap::new()),
            checks: RwLock::new(Vec::new()),
            alerts,
        }
    }

    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertBus> {
        &self.alerts
    }

    fn classify(&self, error_rate: f64, avg_ms: f64) -> HealthStatus {
        let c = &self.config;
        if error_rate > c.unhealthy_error_rate || avg_ms > c.unhealthy_response_ms {
            HealthStatus::Unhealthy
        } else if error_rate > c.degraded_error_rate || avg_ms > c.degraded_response_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Record one observation and re-derive the service's status.
    pub fn record_metric(&self, metric: PerformanceMetric) {
        let service = metric.service.clone();
        let (previous, current, error_rate, avg_ms) = {
            let mut services = self.services.lock();
            let state = services.entry(service.clone()).or_insert_with(ServiceState::new);

            state.total_requests += 1;
            state.last_checked = metric.timestamp;
            if let Some(err) = &metric.error_message {
                state.last_error = Some(err.clone());
            }
            state.history.push_back(metric);
            while state.history.len() > self.config.max_history_per_service.max(1) {
                state.history.pop_front();
            }

            let window = self.config.window_size.max(1);
            let recent: Vec<&PerformanceMetric> = state.history.iter().rev().take(window).collect();
            let failures = recent.iter().filter(|m| !m.success).count();
            state.error_rate = failures as f64 / recent.len() as f64;
            state.avg_response_time_ms =
                recent.iter().map(|m| m.duration_ms()).sum::<f64>() / recent.len() as f64;

            let previous = state.status;
            state.status = self.classify(state.error_rate, state.avg_response_time_ms);
            (previous, state.status, state.error_rate, state.avg_response_time_ms)
        };

        crate::metrics::set_health_status(&service, current as u8);
        if previous != current {
            self.on_transition(&service, previous, current, error_rate, avg_ms);
        }
    }

    fn on_transition(&self, service: &str, from: HealthStatus, to: HealthStatus, error_rate: f64, avg_ms: f64) {
        let detail = format!(
            "{service} {from} -> {to} (error rate {:.0}%, avg {:.0}ms)",
            error_rate * 100.0,
            avg_ms
        );
        let alert = match to {
            HealthStatus::Unhealthy => Alert::new(AlertLevel::Error, "Service unhealthy", detail),
            HealthStatus::Degraded if from == HealthStatus::Healthy => {
                Alert::new(AlertLevel::Warning, "Service degraded", detail)
            }
            HealthStatus::Degraded => Alert::new(AlertLevel::Info, "Service improving", detail),
            HealthStatus::Healthy => Alert::new(AlertLevel::Success, "Service recovered", detail),
        };
        self.alerts.notify(alert.for_service(service));
    }

    /// Health of one service, or of every known service when `None`.
    pub fn get_service_health(&self, service: Option<&str>) -> Vec<ServiceHealth> {
        let services = self.services.lock();
        match service {
            Some(name) => services
                .get(name)
                .map(|s| vec![s.snapshot(name)])
                .unwrap_or_default(),
            None => services.iter().map(|(name, s)| s.snapshot(name)).collect(),
        }
    }

    #[must_use]
    pub fn status_of(&self, service: &str) -> Option<HealthStatus> {
        self.services.lock().get(service).map(|s| s.status)
    }

    /// Aggregate metrics for one service (or all) recorded within `window` of now.
    pub fn get_performance_report(&self, service: Option<&str>, window: Option<Duration>) -> PerformanceReport {
        let since = window.map(|w| now_millis() - i64::try_from(w.as_millis()).unwrap_or(i64::MAX));
        let services = self.services.lock();

        let mut selected: Vec<&PerformanceMetric> = services
            .iter()
            .filter(|(name, _)| service.map_or(true, |s| s == name.as_str()))
            .flat_map(|(_, state)| state.history.iter())
            .filter(|m| since.map_or(true, |t| m.timestamp >= t))
            .collect();
        selected.sort_by_key(|m| m.timestamp);

        PerformanceReport::from_metrics(&selected)
    }

    pub fn register_check(&self, service: impl Into<String>, check: Arc<dyn HealthCheck>) {
        self.checks.write().push((service.into(), check));
    }

    /// Run every registered check once, recording each result as a synthetic metric.
    ///
    /// A check that outlives `check_timeout` is recorded as a failure.
    #[tracing::instrument(skip(self))]
    pub async fn run_health_checks(&self) {
        let checks: Vec<(String, Arc<dyn HealthCheck>)> = self.checks.read().clone();
        let limit = self.config.check_timeout();
        for (service, check) in checks {
            let start = Instant::now();
            let result = match tokio::time::timeout(limit, check.check()).await {
                Ok(result) => result,
                Err(_) => Err(format!("Health check timed out after {}ms", limit.as_millis())),
            };
            let metric = match result {
                Ok(()) => PerformanceMetric::success(&service, "health_check", start.elapsed()),
                Err(e) => {
                    debug!(service = %service, error = %e, "Health check failed");
                    PerformanceMetric::failure(&service, "health_check", start.elapsed(), e)
                }
            };
            self.record_metric(metric);
        }
    }

    /// Drop metrics older than `retention`. Returns how many were removed.
    pub fn prune(&self, retention: Duration) -> usize {
        let cutoff = now_millis() - i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let mut removed = 0;
        let mut services = self.services.lock();
        for state in services.values_mut() {
            let before = state.history.len();
            state.history.retain(|m| m.timestamp >= cutoff);
            removed += before - state.history.len();
        }
        if removed > 0 {
            debug!(removed, "Pruned old performance metrics");
        }
        removed
    }

    /// Forget every recorded metric and status (operator action).
    pub fn reset(&self) {
        self.services.lock().clear();
        info!("Health monitor metrics reset");
    }

    /// Start the periodic check and prune tasks.
    pub fn spawn_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let checker = Arc::clone(self);
        let check_every = self.config.check_interval();
        let check_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_every);
            interval.tick().await;
            loop {
                interval.tick().await;
                checker.run_health_checks().await;
            }
        });

        let pruner = Arc::clone(self);
        let prune_every = self.config.prune_interval();
        let retention = self.config.retention();
        let prune_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(prune_every);
            interval.tick().await;
            loop {
                interval.tick().await;
                pruner.prune(retention);
            }
        });

        vec![check_task, prune_task]
    }
}
