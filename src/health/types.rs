// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::Serialize;
use std::time::Duration;

use crate::clock::now_millis;

/// One observed call against a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetric {
    pub service: String,
    pub operation: String,
    pub duration: Duration,
    pub success: bool,
    /// Epoch millis
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PerformanceMetric {
    pub fn success(service: impl Into<String>, operation: impl Into<String>, duration: Duration) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            duration,
            success: true,
            timestamp: now_millis(),
            error_message: None,
        }
    }

    pub fn failure(
        service: impl Into<String>,
        operation: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            duration,
            success: false,
            timestamp: now_millis(),
            error_message: Some(error.into()),
        }
    }

    #[must_use]
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy = 0,
    Degraded = 1,
    Unhealthy = 2,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Derived health of one service over its rolling window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub status: HealthStatus,
    /// Failures / window size (0.0 - 1.0)
    pub error_rate: f64,
    pub avg_response_time_ms: f64,
    /// Metrics recorded since start or last reset
    pub total_requests: u64,
    pub last_checked: i64,
    pub last_error: Option<String>,
}

/// Aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total_requests: usize,
    /// 0.0 when there were no requests
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub p95_response_time_ms: f64,
    /// Newest first, at most 10
    pub recent_errors: Vec<String>,
}

const RECENT_ERRORS: usize = 10;

impl PerformanceReport {
    /// Build a report from metrics in chronological order.
    pub fn from_metrics(metrics: &[&PerformanceMetric]) -> Self {
        let total = metrics.len();
        if total == 0 {
            return Self::default();
        }

        let successes = metrics.iter().filter(|m| m.success).count();
        let mut durations: Vec<f64> = metrics.iter().map(|m| m.duration_ms()).collect();
        let avg = durations.iter().sum::<f64>() / total as f64;
        durations.sort_by(f64::total_cmp);

        let recent_errors = metrics
            .iter()
            .rev()
            .filter_map(|m| m.error_message.clone())
            .take(RECENT_ERRORS)
            .collect();

        Self {
            total_requests: total,
            success_rate: successes as f64 / total as f64,
            avg_response_time_ms: avg,
            p95_response_time_ms: percentile(&durations, 0.95),
            recent_errors,
        }
    }
}

/// Sorted-array index percentile: `sorted[floor(n * p)]`, clamped to the last element.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
