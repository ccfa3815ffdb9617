//! # Locus Core
//!
//! The resilient data-access core of a location client (places, restaurants,
//! grocery stores). Reads go through a tiered cache and a multi-source
//! router; mutations survive connectivity loss through a durable retry queue.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DataCoordinator                        │
//! │  • fetch(): cache → router                                 │
//! │  • submit(): send, or queue on connectivity failure        │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                  │
//!               ▼                                  ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────┐
//! │ TieredCache                  │   │ OfflineQueue             │
//! │  • L1: volatile, bounded     │   │  • priority, then age    │
//! │  • L2: durable local store   │   │  • exponential backoff   │
//! │  • L3: fetcher (router)      │   │  • dead letters          │
//! └──────────────────────────────┘   └──────────────────────────┘
//!               │                                  │
//!               ▼                                  ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────┐
//! │ SourceRouter                 │   │ LocalStore               │
//! │  • per-source circuits       │   │  • SQLite or in-memory   │
//! │  • priority / latency / RR   │   │  • TTL envelopes         │
//! └──────────────────────────────┘   └──────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ HealthMonitor + AlertBus                                    │
//! │  • error rate and latency per service                      │
//! │  • alerts on status transitions, recovery loop reprobes    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use locus_core::{CacheOptions, Collection, DataCoordinator, LocusConfig, ServiceType, SourceError};
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
//! #[tokio::main]
//! async fn main() {
//!     let coordinator = DataCoordinator::open(LocusConfig::default(), Arc::new(Http));
//!     coordinator.start().await.expect("Failed to start");
//!
//!     let lookup = |source: String| async move {
//!         Ok::<_, SourceError>(Some(format!("Corner Deli (via {source})")))
//!     };
//!     let name: Option<String> = coordinator
//!         .fetch(Collection::Places, "place-1", ServiceType::Places, &lookup, &CacheOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{name:?}");
//!
//!     coordinator.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`DataCoordinator`] tying the components together
//! - [`storage`]: Durable local store and its engines (SQLite, memory)
//! - [`cache`]: Volatile tier and the three-tier read path
//! - [`routing`]: Source router and route table
//! - [`resilience`]: Circuit breakers, backoff, the offline queue
//! - [`health`]: Performance metrics, service health, alerts

pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod fetcher;
pub mod health;
pub mod metrics;
pub mod resilience;
pub mod routing;
pub mod storage;

pub use cache::{CacheError, CacheMetrics, CacheOptions, TieredCache};
pub use config::{CacheConfig, LocusConfig, MonitorConfig, QueueConfig, RouterConfig, SourceConfig};
pub use coordinator::{CoordinatorError, DataCoordinator, EngineState, HealthReport, SubmitOutcome};
pub use fetcher::Fetcher;
pub use health::{Alert, AlertBus, AlertLevel, AlertSink, HealthCheck, HealthMonitor, HealthStatus, PerformanceMetric, PerformanceReport, ServiceHealth};
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitState};
pub use resilience::offline_queue::{DeadLetter, HttpMethod, OfflineQueue, ProcessSummary, QueueError, QueueStatus, QueuedRequest, RequestError, RequestExecutor, RequestPriority};
pub use resilience::retry::RetryConfig;
pub use routing::{DataSource, RouteError, RoutingStrategy, ServiceType, SourceError, SourceProbe, SourceRouter};
pub use storage::{Collection, DurableStore, InMemoryStore, LocalStore, SqlStore, StorageError, StoredItem};
