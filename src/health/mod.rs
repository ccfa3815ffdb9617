// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Health monitoring and operator alerts.

pub mod alerts;
pub mod monitor;
pub mod types;

pub use alerts::{Alert, AlertBus, AlertLevel, AlertSink};
pub use monitor::{HealthCheck, HealthMonitor};
pub use types::{HealthStatus, PerformanceMetric, PerformanceReport, ServiceHealth};
