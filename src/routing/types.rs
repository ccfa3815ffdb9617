// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::resilience::circuit_breaker::CircuitState;

/// Logical request type. Each maps to an ordered list of candidate sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Places,
    Restaurants,
    GroceryStores,
    Search,
    Geocoding,
    UserData,
}

impl ServiceType {
    pub const ALL: [ServiceType; 6] = [
        ServiceType::Places,
        ServiceType::Restaurants,
        ServiceType::GroceryStores,
        ServiceType::Search,
        ServiceType::Geocoding,
        ServiceType::UserData,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Places => "places",
            Self::Restaurants => "restaurants",
            Self::GroceryStores => "grocery_stores",
            Self::Search => "search",
            Self::Geocoding => "geocoding",
            Self::UserData => "user_data",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How available candidates are ordered before sequential attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Ascending priority number
    #[default]
    Priority,
    /// Ascending moving-average latency
    LeastResponseTime,
    /// Rotating start index
    RoundRobin,
}

/// Static service → candidate source ids table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<ServiceType, Vec<String>>,
}

impl RouteTable {
    pub fn new(routes: HashMap<ServiceType, Vec<String>>) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn candidates(&self, service: ServiceType) -> Option<&[String]> {
        self.routes.get(&service).map(Vec::as_slice)
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceType> + '_ {
        self.routes.keys().copied()
    }
}

/// Point-in-time view of one upstream source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub priority: u32,
    /// `false` while the circuit is open
    pub is_available: bool,
    pub last_health_check: Option<i64>,
    /// Exponentially smoothed attempt latency
    pub response_time_ms: f64,
    pub error_count: u32,
    pub max_errors: u32,
    pub circuit: CircuitState,
    pub last_error: Option<String>,
}

/// Failure of one attempt against one source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source '{source_id}' timed out after {timeout_ms}ms")]
    Timeout { source_id: String, timeout_ms: u64 },
    #[error("Source unreachable: {0}")]
    Unreachable(String),
    #[error("Request failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("No route configured for service '{0}'")]
    NoRoute(ServiceType),
    #[error("No sources available for service '{service}'")]
    NoSourcesAvailable { service: ServiceType },
    #[error("Source '{source_id}' failed: {error}")]
    SourceFailed { source_id: String, error: SourceError },
    #[error("Fallback failed: {0}")]
    FallbackFailed(SourceError),
}

impl RouteError {
    /// The underlying source error, when there is one.
    #[must_use]
    pub fn source_error(&self) -> Option<&SourceError> {
        match self {
            Self::SourceFailed { error, .. } | Self::FallbackFailed(error) => Some(error),
            _ => None,
        }
    }

    /// True when nothing upstream could be reached at all.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.source_error(),
            Some(SourceError::Unreachable(_) | SourceError::Timeout { .. })
        ) || matches!(self, Self::NoSourcesAvailable { .. })
    }
}
