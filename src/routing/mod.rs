// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Source routing with per-source circuit breaking.

pub mod router;
pub mod types;

pub use router::{SourceProbe, SourceRequest, SourceRouter};
pub use types::{DataSource, RouteError, RouteTable, RoutingStrategy, ServiceType, SourceError};
