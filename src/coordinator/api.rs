// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Data access API: cached reads, mutations, reporting and operator actions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CoordinatorError, DataCoordinator, HealthReport, SubmitOutcome};
use crate::cache::CacheOptions;
use crate::resilience::offline_queue::QueuedRequest;
use crate::routing::{ServiceType, SourceRequest};
use crate::storage::Collection;

/// Collections that hold cached reads (not queue bookkeeping).
const CACHED_COLLECTIONS: [Collection; 5] = [
    Collection::Places,
    Collection::Restaurants,
    Collection::GroceryStores,
    Collection::SearchResults,
    Collection::UserPreferences,
];

impl DataCoordinator {
    /// Read through the cache, routing misses to the sources for `service`.
    ///
    /// A source answering `None` means "no such record" and is not cached.
    pub async fn fetch<T, R>(
        &self,
        collection: Collection,
        key: &str,
        service: ServiceType,
        request: &R,
        options: &CacheOptions,
    ) -> Result<Option<T>, CoordinatorError>
    where
        T: Serialize + DeserializeOwned + Send,
        R: SourceRequest<Output = Option<T>>,
    {
        let router = &self.router;
        let fetcher = move || async move { router.route_request(service, request).await };
        Ok(self.cache.get(collection, key, &fetcher, options).await?)
    }

    /// Send a mutation upstream, or persist it for replay.
    ///
    /// Offline, the request is queued without an attempt. Online, a
    /// connectivity failure queues it; any other failure is returned.
    #[tracing::instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    pub async fn submit(&self, request: QueuedRequest) -> Result<SubmitOutcome, CoordinatorError> {
        if !self.is_online() {
            let id = self.queue.enqueue(request).await?;
            debug!(id = %id, "Offline, mutation queued");
            return Ok(SubmitOutcome::Queued { id });
        }

        match self.executor.execute(&request).await {
            Ok(()) => Ok(SubmitOutcome::Sent),
            Err(e) if e.is_connectivity() => {
                warn!(error = %e, "Mutation failed on connectivity, queueing");
                let id = self.queue.enqueue(request).await?;
                Ok(SubmitOutcome::Queued { id })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Update the connectivity signal. Going online drains the queue.
    pub fn set_online(&self, online: bool) {
        let was = self.online.send_replace(online);
        if was != online {
            info!(online, "Connectivity changed");
        }
    }

    /// Snapshot of lifecycle, sources, services, cache and queue.
    pub async fn health_report(&self) -> Result<HealthReport, CoordinatorError> {
        Ok(HealthReport {
            state: self.state(),
            online: self.is_online(),
            sources: self.router.sources(),
            services: self.monitor.get_service_health(None),
            cache: self.cache.get_metrics(),
            queue: self.queue.get_status().await?,
        })
    }

    /// Zero the cache counters and forget recorded performance metrics.
    pub fn reset_metrics(&self) {
        self.cache.reset_metrics();
        self.monitor.reset();
    }

    /// Force a source back into rotation. Returns false for an unknown id.
    pub fn reset_source(&self, id: &str) -> bool {
        self.router.reset_source(id)
    }

    /// Delete expired records from every cached collection.
    pub async fn clear_expired(&self) -> Result<usize, CoordinatorError> {
        let mut removed = 0;
        for collection in CACHED_COLLECTIONS {
            removed += self.cache.clear_expired(collection).await?;
        }
        if removed > 0 {
            info!(removed, "Cleared expired cache records");
        }
        Ok(removed)
    }
}
