// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Coordinator lifecycle: start, the recovery loop, shutdown.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CoordinatorError, DataCoordinator, EngineState};
use crate::health::{Alert, AlertLevel};
use crate::resilience::offline_queue::OfflineQueue;
use crate::routing::{SourceProbe, SourceRouter};

impl DataCoordinator {
    /// Start the coordinator.
    ///
    /// Startup flow:
    /// 1. Initialize the durable store (creates tables on first run)
    /// 2. Drain any queued mutations left from a previous run
    /// 3. Spawn background tasks: source probes, monitor checks and pruning,
    ///    the connectivity listener, and the recovery loop
    ///
    /// Only valid from `Created`. A store failure puts the coordinator back
    /// in `Created` so the caller may retry.
    #[tracing::instrument(skip(self), fields(sources = self.config.router.sources.len()))]
    pub async fn start(&self) -> Result<(), CoordinatorError> {
        let current = self.state();
        if current != EngineState::Created {
            return Err(CoordinatorError::InvalidState(current));
        }
        let startup_start = std::time::Instant::now();
        info!("Starting data coordinator");
        self.set_state(EngineState::Starting);

        if let Err(e) = self.store.init().await {
            warn!(error = %e, "Durable store failed to open");
            self.set_state(EngineState::Created);
            return Err(e.into());
        }

        match self.queue.process_queue().await {
            Ok(summary) if summary.attempted > 0 => {
                info!(
                    attempted = summary.attempted,
                    succeeded = summary.succeeded,
                    rescheduled = summary.rescheduled,
                    dropped = summary.dropped,
                    "Drained offline queue from previous run"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Startup queue drain failed"),
        }

        let mut tasks = self.monitor.spawn_tasks();
        tasks.push(self.queue.spawn_connectivity_listener());
        if let Some(probe) = &self.probe {
            // One probe per source per interval; the router reports each result to the monitor
            tasks.push(self.router.spawn_health_checks(Arc::clone(probe)));
        }
        tasks.push(self.spawn_recovery());
        let spawned = tasks.len();
        self.tasks.lock().extend(tasks);

        self.set_state(EngineState::Running);
        info!(
            tasks = spawned,
            elapsed_ms = startup_start.elapsed().as_millis() as u64,
            "Data coordinator running"
        );
        Ok(())
    }

    /// Subscribe to the alert bus and act on it:
    /// - a warning or error about a source triggers an immediate reprobe
    /// - a success about a source drains the offline queue
    fn spawn_recovery(&self) -> JoinHandle<()> {
        let mut rx = self.alerts.subscribe();
        let router = Arc::clone(&self.router);
        let queue = Arc::clone(&self.queue);
        let probe = self.probe.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(alert) => recover(&alert, &router, &queue, probe.as_deref()).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Recovery loop lagged behind alert bus");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Alert bus closed, stopping recovery loop");
                        break;
                    }
                }
            }
        })
    }

    /// Stop every background task. Queued mutations stay in the store.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        if matches!(self.state(), EngineState::ShuttingDown | EngineState::Stopped) {
            return;
        }
        info!("Shutting down data coordinator");
        self.set_state(EngineState::ShuttingDown);

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }

        self.set_state(EngineState::Stopped);
        info!("Data coordinator stopped");
    }
}

async fn recover(alert: &Alert, router: &SourceRouter, queue: &OfflineQueue, probe: Option<&dyn SourceProbe>) {
    let Some(service) = alert.service.as_deref() else {
        return;
    };
    if router.source(service).is_none() {
        return;
    }

    match alert.level {
        AlertLevel::Warning | AlertLevel::Error => {
            if let Some(probe) = probe {
                debug!(source = %service, title = %alert.title, "Reprobing flagged source");
                router.check_source(probe, service).await;
            }
        }
        AlertLevel::Success => {
            if queue.is_online() {
                info!(source = %service, "Source recovered, draining offline queue");
                if let Err(e) = queue.process_queue().await {
                    warn!(error = %e, "Recovery queue drain failed");
                }
            }
        }
        AlertLevel::Info => {}
    }
}
