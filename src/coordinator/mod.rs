// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Data coordinator.
//!
//! The [`DataCoordinator`] is the orchestration entry point that ties the
//! components together:
//! - Durable local store (SQLite by default)
//! - Tiered cache in front of the source router
//! - Source router with per-source circuit breaking
//! - Offline retry queue for mutations
//! - Health monitor, alert bus and the recovery routine that acts on alerts
//!
//! Every registry is owned by one coordinator instance: create it at process
//! start, call [`shutdown`](DataCoordinator::shutdown) at exit.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Starting → Running → ShuttingDown → Stopped
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use locus_core::{DataCoordinator, EngineState, LocusConfig};
//! use locus_core::resilience::offline_queue::{QueuedRequest, RequestError, RequestExecutor};
//! use std::sync::Arc;
//!
//! struct Http;
//!
//! #[async_trait::async_trait]
//! impl RequestExecutor for Http {
//!     async fn execute(&self, _request: &QueuedRequest) -> Result<(), RequestError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let coordinator = DataCoordinator::open(LocusConfig::default(), Arc::new(Http));
//! assert_eq!(coordinator.state(), EngineState::Created);
//!
//! coordinator.start().await.expect("Start failed");
//! assert!(coordinator.is_running());
//! coordinator.shutdown().await;
//! # }
//! ```

mod api;
mod lifecycle;
mod types;

pub use types::{CoordinatorError, EngineState, HealthReport, SubmitOutcome};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::TieredCache;
use crate::config::LocusConfig;
use crate::health::{AlertBus, HealthMonitor};
use crate::resilience::offline_queue::{OfflineQueue, RequestExecutor};
use crate::routing::{SourceProbe, SourceRouter};
use crate::storage::{DurableStore, LocalStore, SqlStore};

pub struct DataCoordinator {
    pub(super) config: LocusConfig,

    /// Lifecycle state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,
    pub(super) state_rx: watch::Receiver<EngineState>,

    /// Connectivity signal the offline queue listens to
    pub(super) online: watch::Sender<bool>,

    pub(super) store: LocalStore,
    pub(super) cache: Arc<TieredCache>,
    pub(super) router: Arc<SourceRouter>,
    pub(super) queue: Arc<OfflineQueue>,
    pub(super) monitor: Arc<HealthMonitor>,
    pub(super) alerts: Arc<AlertBus>,
    pub(super) executor: Arc<dyn RequestExecutor>,

    /// Reachability probe for sources; without one, no periodic probing runs
    pub(super) probe: Option<Arc<dyn SourceProbe>>,

    pub(super) tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DataCoordinator {
    /// Create a coordinator over any durable engine.
    ///
    /// Starts in `Created` and assumes the client is online.
    pub fn new(config: LocusConfig, engine: Arc<dyn DurableStore>, executor: Arc<dyn RequestExecutor>) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let (online_tx, online_rx) = watch::channel(true);

        let store = LocalStore::new(engine);
        let alerts = Arc::new(AlertBus::new());
        let monitor = Arc::new(HealthMonitor::new(config.monitor.clone(), alerts.clone()));
        let router = Arc::new(SourceRouter::new(&config.router, monitor.clone(), alerts.clone()));
        let cache = Arc::new(TieredCache::new(store.clone(), config.cache.clone()));
        let queue = Arc::new(OfflineQueue::new(
            store.clone(),
            executor.clone(),
            config.queue.clone(),
            online_rx,
        ));

        Self {
            config,
            state: state_tx,
            state_rx,
            online: online_tx,
            store,
            cache,
            router,
            queue,
            monitor,
            alerts,
            executor,
            probe: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Create a coordinator over the SQLite store at `config.store_path`.
    pub fn open(config: LocusConfig, executor: Arc<dyn RequestExecutor>) -> Self {
        let engine = Arc::new(SqlStore::at_path(&config.store_path()));
        Self::new(config, engine, executor)
    }

    /// Attach a reachability probe used by the periodic checks and recovery.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn SourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    #[must_use]
    pub fn config(&self) -> &LocusConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    #[must_use]
    pub fn router(&self) -> &Arc<SourceRouter> {
        &self.router
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertBus> {
        &self.alerts
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state.send(state);
        crate::metrics::set_coordinator_state(state.as_gauge());
    }
}
