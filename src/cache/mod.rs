// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered cache: volatile in-process tier over the durable local store.

pub mod entry;
pub mod volatile;
pub mod tiered;

pub use entry::CacheEntry;
pub use volatile::VolatileTier;
pub use tiered::{CacheError, CacheMetrics, CacheOptions, TieredCache};
