// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the data coordinator.

use serde::Serialize;
use thiserror::Error;

use crate::cache::{CacheError, CacheMetrics};
use crate::health::ServiceHealth;
use crate::resilience::offline_queue::{QueueError, QueueStatus, RequestError};
use crate::routing::{DataSource, RouteError};
use crate::storage::StorageError;

/// Coordinator lifecycle state.
///
/// Use [`super::DataCoordinator::state()`] to check the current state or
/// [`super::DataCoordinator::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// Just created, not yet started
    Created,
    /// Opening the store and draining leftovers from the last run
    Starting,
    /// Background tasks running
    Running,
    /// Stopping background tasks
    ShuttingDown,
    /// All tasks stopped
    Stopped,
}

impl EngineState {
    pub(crate) fn as_gauge(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// What happened to a submitted mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Delivered upstream
    Sent,
    /// Persisted for replay; `id` is the queued request id
    Queued { id: String },
}

/// Point-in-time view of the whole data-access core.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: EngineState,
    pub online: bool,
    pub sources: Vec<DataSource>,
    pub services: Vec<ServiceHealth>,
    pub cache: CacheMetrics,
    pub queue: QueueStatus,
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid coordinator state: {0}")]
    InvalidState(EngineState),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cache(#[from] CacheError<RouteError>),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Request(#[from] RequestError),
}
