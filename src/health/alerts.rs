// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fire-and-forget operator alerts.
//!
//! [`AlertBus`] logs every alert through `tracing`, counts it, forwards it to
//! registered [`AlertSink`]s and fans it out to in-process subscribers (the
//! coordinator's recovery routine listens here).

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::clock::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    /// Source id or service name the alert concerns
    pub service: Option<String>,
    pub timestamp: i64,
}

impl Alert {
    pub fn new(level: AlertLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            service: None,
            timestamp: now_millis(),
        }
    }

    #[must_use]
    pub fn for_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// Operator-facing notification channel.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &Alert);
}

const ALERT_CHANNEL_CAPACITY: usize = 64;

pub struct AlertBus {
    tx: broadcast::Sender<Alert>,
    sinks: RwLock<Vec<Arc<dyn AlertSink>>>,
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            tx,
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn add_sink(&self, sink: Arc<dyn AlertSink>) {
        self.sinks.write().push(sink);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    pub fn notify(&self, alert: Alert) {
        let service = alert.service.as_deref().unwrap_or("-");
        match alert.level {
            AlertLevel::Success | AlertLevel::Info => {
                info!(service, title = %alert.title, "{}", alert.message)
            }
            AlertLevel::Warning => warn!(service, title = %alert.title, "{}", alert.message),
            AlertLevel::Error => error!(service, title = %alert.title, "{}", alert.message),
        }
        crate::metrics::record_alert(alert.level.as_str());

        for sink in self.sinks.read().iter() {
            sink.notify(&alert);
        }
        // No subscribers is fine
        let _ = self.tx.send(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Alert>>);

    impl AlertSink for Recording {
        fn notify(&self, alert: &Alert) {
            self.0.lock().push(alert.clone());
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_alerts() {
        let bus = AlertBus::new();
        let mut rx = bus.subscribe();

        bus.notify(Alert::new(AlertLevel::Warning, "Service degraded", "backend slow").for_service("backend"));

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.service.as_deref(), Some("backend"));
    }

    #[test]
    fn test_sinks_receive_alerts() {
        let bus = AlertBus::new();
        let sink = Arc::new(Recording::default());
        bus.add_sink(sink.clone());

        bus.notify(Alert::new(AlertLevel::Error, "Circuit opened", "maps failing"));
        bus.notify(Alert::new(AlertLevel::Success, "Recovered", "maps back"));

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].level, AlertLevel::Success);
    }

    #[test]
    fn test_notify_without_subscribers_does_not_panic() {
        AlertBus::default().notify(Alert::new(AlertLevel::Info, "t", "m"));
    }
}
