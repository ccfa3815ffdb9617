// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline Retry Queue
//!
//! Persists failed outbound mutations in the durable local store and replays
//! them with exponential backoff once the client is online.
//!
//! # Replay
//!
//! ```text
//! enqueue ─→ offline_queue collection ─→ (online?) process_queue
//!                                              │
//!             due requests, priority desc then creation order
//!                                              │
//!            ┌─────────────── execute ─────────┴────────────────┐
//!            ▼                                                  ▼
//!        success: delete                   failure: retry_count += 1
//!                                  ┌─────────────────┴───────────────────┐
//!                                  ▼                                     ▼
//!                     retry_count >= max_retries          next_retry_at = now + backoff
//!                     drop, log, dead-letter
//! ```
//!
//! Only one drain runs at a time. An enqueue may race a running drain; the
//! store overwrites by id, so at worst the new request waits for the next drain.
//!
//! Records that no longer decode (an older client's layout, a damaged file)
//! are logged with their raw payload and removed on read, so they never hold
//! up the requests behind them.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::now_millis;
use crate::config::QueueConfig;
use crate::resilience::retry::RetryConfig;
use crate::storage::{Collection, LocalStore, StorageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A mutating call waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub priority: RequestPriority,
    pub retry_count: u32,
    /// `0` takes the queue's configured limit on enqueue
    pub max_retries: u32,
    pub created_at: i64,
    pub next_retry_at: i64,
}

impl QueuedRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            method,
            body: None,
            headers: None,
            priority: RequestPriority::Normal,
            retry_count: 0,
            max_retries: 0,
            created_at: now,
            next_retry_at: now,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn is_due(&self, now: i64) -> bool {
        self.next_retry_at <= now
    }
}

/// Failure of one outbound call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Client is offline")]
    Offline,
    #[error("Request timed out")]
    Timeout,
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Request failed: {0}")]
    Failed(String),
}

impl RequestError {
    /// True when the request never reached the server.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Offline | Self::Timeout)
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Request error: {0}")]
    Request(#[from] RequestError),
}

/// Sends a queued request upstream.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &QueuedRequest) -> Result<(), RequestError>;
}

/// A request that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub request: QueuedRequest,
    pub error: String,
    pub dropped_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Never attempted
    pub pending: usize,
    /// Attempted at least once and rescheduled
    pub failed: usize,
    pub dead_lettered: usize,
    pub processing: bool,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub dropped: usize,
}

pub struct OfflineQueue {
    store: LocalStore,
    executor: Arc<dyn RequestExecutor>,
    config: QueueConfig,
    backoff: RetryConfig,
    online: watch::Receiver<bool>,
    processing: AtomicBool,
}

impl OfflineQueue {
    pub fn new(
        store: LocalStore,
        executor: Arc<dyn RequestExecutor>,
        config: QueueConfig,
        online: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            executor,
            backoff: config.retry_config(),
            config,
            online,
            processing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Persist a request and, when online, start a drain right away.
    ///
    /// Returns the request id. A failing drain is logged, not returned:
    /// the request is already safe on disk.
    pub async fn enqueue(&self, mut request: QueuedRequest) -> Result<String, QueueError> {
        let now = now_millis();
        request.retry_count = 0;
        request.next_retry_at = now;
        if request.max_retries == 0 {
            request.max_retries = self.config.max_retries;
        }

        self.store
            .set(Collection::OfflineQueue, &request.id, &request, None)
            .await?;
        info!(id = %request.id, method = ?request.method, url = %request.url, priority = ?request.priority, "Request queued for replay");

        if self.is_online() {
            if let Err(e) = self.process_queue().await {
                warn!(error = %e, "Queue drain after enqueue failed");
            }
        }
        Ok(request.id)
    }

    /// Replay every due request once. A no-op while offline or while
    /// another drain is running.
    pub async fn process_queue(&self) -> Result<ProcessSummary, QueueError> {
        self.process_due(now_millis()).await
    }

    pub(crate) async fn process_due(&self, now: i64) -> Result<ProcessSummary, QueueError> {
        if !self.is_online() {
            debug!("Offline, skipping queue drain");
            return Ok(ProcessSummary::default());
        }
        if self.processing.swap(true, Ordering::AcqRel) {
            debug!("Queue drain already running");
            return Ok(ProcessSummary::default());
        }
        let _guard = DrainGuard(&self.processing);

        let mut queued: Vec<QueuedRequest> = self.load(Collection::OfflineQueue).await?;
        let total = queued.len();
        queued.retain(|r| r.is_due(now));
        queued.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        if queued.is_empty() {
            crate::metrics::set_queue_depth(total);
            return Ok(ProcessSummary::default());
        }
        info!(due = queued.len(), total, "Draining offline queue");

        let mut summary = ProcessSummary::default();
        for request in queued {
            summary.attempted += 1;
            match self.executor.execute(&request).await {
                Ok(()) => {
                    self.store.delete(Collection::OfflineQueue, &request.id).await?;
                    summary.succeeded += 1;
                    crate::metrics::record_queue_replay("success");
                    debug!(id = %request.id, "Queued request replayed");
                }
                Err(e) => {
                    let connectivity = e.is_connectivity();
                    if self.record_failure(request, &e).await? {
                        summary.dropped += 1;
                    } else {
                        summary.rescheduled += 1;
                    }
                    if connectivity {
                        // Everything behind this one would fail the same way
                        debug!("Connectivity lost mid-drain, stopping");
                        break;
                    }
                }
            }
        }

        crate::metrics::set_queue_depth(total - summary.succeeded - summary.dropped);
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            rescheduled = summary.rescheduled,
            dropped = summary.dropped,
            "Queue drain complete"
        );
        Ok(summary)
    }

    /// Reschedule or drop a failed request. Returns `true` if dropped.
    ///
    /// Backoff is `min(base * 2^retry_count, max)` taken on the count *before*
    /// this failure is added, so the first failure waits `base_delay_ms`
    /// (1s, 2s, 4s ... with defaults), not `2 * base`.
    async fn record_failure(&self, mut request: QueuedRequest, err: &RequestError) -> Result<bool, QueueError> {
        let attempt = request.retry_count;
        request.retry_count += 1;

        if request.retry_count >= request.max_retries {
            self.store.delete(Collection::OfflineQueue, &request.id).await?;
            crate::metrics::record_queue_drop();
            crate::metrics::record_queue_replay("dropped");
            error!(
                id = %request.id,
                method = ?request.method,
                url = %request.url,
                retries = request.retry_count,
                error = %err,
                "Queued request exhausted retries, dropping"
            );
            if self.config.dead_letter {
                let letter = DeadLetter {
                    request,
                    error: err.to_string(),
                    dropped_at: now_millis(),
                };
                self.store
                    .set(Collection::DeadLetters, &letter.request.id, &letter, None)
                    .await?;
            }
            return Ok(true);
        }

        let delay = self.backoff.delay_for_attempt(attempt);
        request.next_retry_at = now_millis().saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));
        self.store
            .set(Collection::OfflineQueue, &request.id, &request, None)
            .await?;
        crate::metrics::record_queue_replay("rescheduled");
        warn!(
            id = %request.id,
            retry = request.retry_count,
            max = request.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Queued request failed, rescheduled"
        );
        Ok(false)
    }

    pub async fn get_status(&self) -> Result<QueueStatus, QueueError> {
        let queued: Vec<QueuedRequest> = self.load(Collection::OfflineQueue).await?;
        let failed = queued.iter().filter(|r| r.retry_count > 0).count();
        Ok(QueueStatus {
            pending: queued.len() - failed,
            failed,
            dead_lettered: self.store.count(Collection::DeadLetters).await? as usize,
            processing: self.is_processing(),
        })
    }

    /// Every queued request, in replay order.
    pub async fn queued(&self) -> Result<Vec<QueuedRequest>, QueueError> {
        let mut queued: Vec<QueuedRequest> = self.load(Collection::OfflineQueue).await?;
        queued.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(queued)
    }

    pub async fn clear_queue(&self) -> Result<(), QueueError> {
        self.store.clear(Collection::OfflineQueue).await?;
        crate::metrics::set_queue_depth(0);
        info!("Offline queue cleared");
        Ok(())
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        let mut letters: Vec<DeadLetter> = self.load(Collection::DeadLetters).await?;
        letters.sort_by_key(|l| l.dropped_at);
        Ok(letters)
    }

    pub async fn clear_dead_letters(&self) -> Result<(), QueueError> {
        self.store.clear(Collection::DeadLetters).await?;
        Ok(())
    }

    /// Decode every record in a queue collection, discarding the ones that don't.
    async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, QueueError> {
        let items = self.store.get_all_items(collection).await?;
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match T::deserialize(&item.data) {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(
                        collection = %collection,
                        id = %item.id,
                        error = %e,
                        data = %item.data,
                        "Undecodable queue record, discarding"
                    );
                    self.store.delete(collection, &item.id).await?;
                    crate::metrics::record_queue_discard(collection.as_str());
                }
            }
        }
        Ok(records)
    }

    async fn drain_logged(&self) {
        if let Err(e) = self.process_queue().await {
            warn!(error = %e, "Offline queue drain failed");
        }
    }

    /// Drain on every offline → online edge and on the configured interval.
    pub fn spawn_connectivity_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        let mut online = self.online.clone();
        let every = self.config.process_interval();

        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            let mut interval = tokio::time::interval(every);
            interval.tick().await;

            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            debug!("Connectivity signal closed, stopping queue listener");
                            break;
                        }
                        let now_online = *online.borrow_and_update();
                        if now_online && !was_online {
                            info!("Connectivity restored, draining offline queue");
                            queue.drain_logged().await;
                        }
                        was_online = now_online;
                    }
                    _ = interval.tick() => {
                        if queue.is_online() {
                            queue.drain_logged().await;
                        }
                    }
                }
            }
        })
    }
}

/// RAII guard to reset the processing flag.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, StoredItem};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Executor that replays a script of outcomes, then succeeds.
    #[derive(Default)]
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<(), RequestError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn with(outcomes: Vec<Result<(), RequestError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RequestExecutor for Scripted {
        async fn execute(&self, request: &QueuedRequest) -> Result<(), RequestError> {
            self.seen.lock().push(request.url.clone());
            self.outcomes.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    fn queue(executor: Arc<Scripted>, online: bool) -> (OfflineQueue, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(online);
        let store = LocalStore::new(Arc::new(InMemoryStore::new()));
        (OfflineQueue::new(store, executor, QueueConfig::default(), rx), tx)
    }

    fn post(url: &str) -> QueuedRequest {
        QueuedRequest::new(HttpMethod::Post, url).with_body(json!({"rating": 5}))
    }

    #[tokio::test]
    async fn test_enqueue_offline_persists() {
        let exec = Scripted::with(vec![]);
        let (q, _tx) = queue(exec.clone(), false);

        let id = q.enqueue(post("/reviews")).await.unwrap();
        let queued = q.queued().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, id);
        assert_eq!(queued[0].retry_count, 0);
        assert_eq!(queued[0].max_retries, 5);
        assert!(exec.seen.lock().is_empty());
        assert_eq!(q.get_status().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_enqueue_online_replays_immediately() {
        let exec = Scripted::with(vec![]);
        let (q, _tx) = queue(exec.clone(), true);

        q.enqueue(post("/favorites")).await.unwrap();
        assert_eq!(*exec.seen.lock(), vec!["/favorites".to_string()]);
        assert!(q.queued().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replay_order_priority_then_creation() {
        let exec = Scripted::with(vec![]);
        let (q, tx) = queue(exec.clone(), false);

        q.enqueue(post("/low").with_priority(RequestPriority::Low)).await.unwrap();
        let mut first_normal = post("/normal-1");
        first_normal.created_at -= 10;
        q.enqueue(first_normal).await.unwrap();
        q.enqueue(post("/normal-2")).await.unwrap();
        q.enqueue(post("/high").with_priority(RequestPriority::High)).await.unwrap();

        tx.send(true).unwrap();
        let summary = q.process_queue().await.unwrap();
        assert_eq!(summary.succeeded, 4);
        assert_eq!(
            *exec.seen.lock(),
            vec!["/high", "/normal-1", "/normal-2", "/low"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_failure_backoff_and_drop() {
        let failures = (0..5).map(|_| Err(RequestError::Failed("500".into()))).collect();
        let exec = Scripted::with(failures);
        let (q, tx) = queue(exec.clone(), false);
        q.enqueue(post("/reviews")).await.unwrap();
        tx.send(true).unwrap();

        let expected_delays = [1_000i64, 2_000, 4_000, 8_000];
        let mut now = now_millis();
        for (n, delay) in expected_delays.iter().enumerate() {
            let before = now_millis();
            let summary = q.process_due(now).await.unwrap();
            assert_eq!(summary.rescheduled, 1);

            let r = &q.queued().await.unwrap()[0];
            assert_eq!(r.retry_count as usize, n + 1);
            let scheduled = r.next_retry_at - before;
            assert!(scheduled >= *delay && scheduled < delay + 1_000, "attempt {n}: {scheduled}");

            // Not due yet
            assert_eq!(q.process_due(r.next_retry_at - 1).await.unwrap().attempted, 0);
            now = r.next_retry_at;
        }

        // Fifth failure reaches max_retries: dropped, never replayed again
        let summary = q.process_due(now).await.unwrap();
        assert_eq!(summary.dropped, 1);
        assert!(q.queued().await.unwrap().is_empty());
        assert_eq!(q.process_due(i64::MAX).await.unwrap().attempted, 0);
        assert_eq!(exec.seen.lock().len(), 5);

        let letters = q.dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].request.retry_count, 5);
        assert_eq!(letters[0].error, "Request failed: 500");
        assert_eq!(q.get_status().await.unwrap().dead_lettered, 1);

        q.clear_dead_letters().await.unwrap();
        assert!(q.dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_letter_can_be_disabled() {
        let exec = Scripted::with(vec![Err(RequestError::Rejected { status: 422, message: "invalid".into() })]);
        let (tx, rx) = watch::channel(false);
        let q = OfflineQueue::new(
            LocalStore::new(Arc::new(InMemoryStore::new())),
            exec,
            QueueConfig {
                dead_letter: false,
                ..QueueConfig::default()
            },
            rx,
        );
        q.enqueue(post("/x").with_max_retries(1)).await.unwrap();
        tx.send(true).unwrap();

        assert_eq!(q.process_queue().await.unwrap().dropped, 1);
        assert!(q.dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connectivity_error_stops_drain() {
        let exec = Scripted::with(vec![Err(RequestError::Offline)]);
        let (q, tx) = queue(exec.clone(), false);
        q.enqueue(post("/a")).await.unwrap();
        q.enqueue(post("/b")).await.unwrap();
        tx.send(true).unwrap();

        let summary = q.process_queue().await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.rescheduled, 1);

        let status = q.get_status().await.unwrap();
        assert_eq!(status.pending, 1);
        assert_eq!(status.failed, 1);
    }

    #[tokio::test]
    async fn test_undecodable_record_does_not_block_drain() {
        let exec = Scripted::with(vec![]);
        let (q, tx) = queue(exec.clone(), false);
        q.enqueue(post("/reviews")).await.unwrap();
        let legacy = StoredItem::new("legacy-1", json!({"garbage": true}), None);
        q.store.put_item(Collection::OfflineQueue, &legacy).await.unwrap();

        assert_eq!(q.get_status().await.unwrap().pending, 1);

        tx.send(true).unwrap();
        let summary = q.process_queue().await.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(*exec.seen.lock(), vec!["/reviews".to_string()]);
        assert_eq!(q.store.count(Collection::OfflineQueue).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_dead_letter_is_discarded() {
        let (q, _tx) = queue(Scripted::with(vec![]), false);
        let damaged = StoredItem::new("d1", json!("not a letter"), None);
        q.store.put_item(Collection::DeadLetters, &damaged).await.unwrap();

        assert!(q.dead_letters().await.unwrap().is_empty());
        assert_eq!(q.store.count(Collection::DeadLetters).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_drain_is_noop() {
        let exec = Scripted::with(vec![]);
        let (q, _tx) = queue(exec.clone(), false);
        q.enqueue(post("/a")).await.unwrap();
        assert_eq!(q.process_queue().await.unwrap(), ProcessSummary::default());
        assert!(exec.seen.lock().is_empty());
    }

    /// Executor that blocks until released, to hold a drain open.
    struct Gate {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl RequestExecutor for Gate {
        async fn execute(&self, _request: &QueuedRequest) -> Result<(), RequestError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_overlapping_drains_are_rejected() {
        let gate = Arc::new(Gate {
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let (tx, rx) = watch::channel(false);
        let q = Arc::new(OfflineQueue::new(
            LocalStore::new(Arc::new(InMemoryStore::new())),
            gate.clone(),
            QueueConfig::default(),
            rx,
        ));
        q.enqueue(post("/a")).await.unwrap();
        tx.send(true).unwrap();

        let first = tokio::spawn({
            let q = q.clone();
            async move { q.process_queue().await.unwrap() }
        });
        gate.entered.notified().await;
        assert!(q.is_processing());
        assert!(q.get_status().await.unwrap().processing);

        // Second drain returns immediately without attempting anything
        assert_eq!(q.process_queue().await.unwrap().attempted, 0);

        gate.release.notify_one();
        assert_eq!(first.await.unwrap().succeeded, 1);
        assert!(!q.is_processing());
    }

    #[tokio::test]
    async fn test_reconnect_triggers_drain() {
        let exec = Scripted::with(vec![]);
        let (q, tx) = queue(exec.clone(), false);
        let q = Arc::new(q);
        q.enqueue(post("/a")).await.unwrap();

        let listener = q.spawn_connectivity_listener();
        tx.send(true).unwrap();

        for _ in 0..50 {
            if q.queued().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(q.queued().await.unwrap().is_empty());
        assert_eq!(exec.seen.lock().len(), 1);
        listener.abort();
    }

    #[tokio::test]
    async fn test_clear_queue() {
        let (q, _tx) = queue(Scripted::with(vec![]), false);
        q.enqueue(post("/a")).await.unwrap();
        q.enqueue(post("/b")).await.unwrap();
        q.clear_queue().await.unwrap();
        assert_eq!(q.get_status().await.unwrap(), QueueStatus::default());
    }

    #[test]
    fn test_request_builder() {
        let r = QueuedRequest::new(HttpMethod::Put, "/prefs")
            .with_header("Authorization", "Bearer t")
            .with_priority(RequestPriority::High)
            .with_max_retries(3);
        assert_eq!(r.headers.as_ref().unwrap().get("Authorization").map(String::as_str), Some("Bearer t"));
        assert_eq!(r.max_retries, 3);
        assert!(r.is_due(r.created_at));
        assert_eq!(serde_json::to_value(HttpMethod::Delete).unwrap(), json!("DELETE"));
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(RequestError::Offline.is_connectivity());
        assert!(RequestError::Timeout.is_connectivity());
        assert!(!RequestError::Failed("x".into()).is_connectivity());
        assert!(!RequestError::Rejected { status: 400, message: "bad".into() }.is_connectivity());
    }
}
