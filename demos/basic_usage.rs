// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic locus-core usage example.
//!
//! Demonstrates:
//! 1. Building a coordinator over an in-memory store
//! 2. Cached reads routed across two sources
//! 3. A failing source tripping its circuit, with fallback to the next one
//! 4. Mutations queued while offline and replayed on reconnect
//! 5. The health report and recorded metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use async_trait::async_trait;
use locus_core::{
    CacheOptions, Collection, DataCoordinator, EngineState, HttpMethod, InMemoryStore, LocusConfig, QueuedRequest,
    RequestError, RequestExecutor, RequestPriority, ServiceType, SourceError, SubmitOutcome,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Pretend HTTP client: fails with `Offline` while the network is down.
struct DemoClient {
    network_up: AtomicBool,
    delivered: AtomicUsize,
}

#[async_trait]
impl RequestExecutor for DemoClient {
    async fn execute(&self, request: &QueuedRequest) -> Result<(), RequestError> {
        if !self.network_up.load(Ordering::SeqCst) {
            return Err(RequestError::Offline);
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        println!("   → delivered {:?} {}", request.method, request.url);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt().with_target(false).compact().init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              locus-core: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Build and start
    // ─────────────────────────────────────────────────────────────────────────
    let client = Arc::new(DemoClient {
        network_up: AtomicBool::new(true),
        delivered: AtomicUsize::new(0),
    });
    let coordinator = DataCoordinator::new(LocusConfig::default(), Arc::new(InMemoryStore::new()), client.clone());
    println!("📦 State: {}", coordinator.state());

    coordinator.start().await?;
    assert_eq!(coordinator.state(), EngineState::Running);
    println!("🚀 State: {}\n", coordinator.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Cached reads
    // ─────────────────────────────────────────────────────────────────────────
    println!("🍕 Reading restaurants through the cache...");
    let upstream_calls = AtomicUsize::new(0);
    let lookup = |source: String| {
        upstream_calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, SourceError>(Some(json!({"name": "Luigi's", "served_by": source}))) }
    };

    for round in 1..=3 {
        let value: Option<serde_json::Value> = coordinator
            .fetch(Collection::Restaurants, "luigis", ServiceType::Restaurants, &lookup, &CacheOptions::default())
            .await?;
        println!("   round {round}: {}", value.unwrap_or_default());
    }
    println!("   upstream calls: {}\n", upstream_calls.load(Ordering::SeqCst));

    // ─────────────────────────────────────────────────────────────────────────
    // 3. A failing primary source
    // ─────────────────────────────────────────────────────────────────────────
    println!("⚡ Backend failing, watching the router fall through to maps...");
    let flaky = |source: String| async move {
        if source == "backend" {
            Err(SourceError::Unreachable("connection refused".into()))
        } else {
            Ok(Some(json!({"name": format!("Grocer via {source}")})))
        }
    };
    for i in 0..4 {
        let key = format!("grocer-{i}");
        let value: Option<serde_json::Value> = coordinator
            .fetch(Collection::GroceryStores, &key, ServiceType::GroceryStores, &flaky, &CacheOptions::default())
            .await?;
        println!("   {key}: {}", value.unwrap_or_default());
    }
    for source in coordinator.router().sources() {
        println!(
            "   source {:<8} circuit={:<8} errors={}/{}",
            source.id, source.circuit, source.error_count, source.max_errors
        );
    }
    println!();

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Offline mutations
    // ─────────────────────────────────────────────────────────────────────────
    println!("📴 Going offline and saving favorites...");
    client.network_up.store(false, Ordering::SeqCst);
    coordinator.set_online(false);

    for place in ["luigis", "corner-deli"] {
        let request = QueuedRequest::new(HttpMethod::Post, "/favorites")
            .with_body(json!({"place_id": place}))
            .with_priority(RequestPriority::High);
        if let SubmitOutcome::Queued { id } = coordinator.submit(request).await? {
            println!("   queued {id}");
        }
    }
    println!("   queue: {:?}", coordinator.queue().get_status().await?);

    println!("📶 Back online...");
    client.network_up.store(true, Ordering::SeqCst);
    coordinator.set_online(true);
    coordinator.queue().process_queue().await?;
    println!("   delivered: {}", client.delivered.load(Ordering::SeqCst));
    println!("   queue: {:?}\n", coordinator.queue().get_status().await?);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Health report and metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("🩺 Health report:");
    let report = coordinator.health_report().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);

    coordinator.shutdown().await;
    println!("\n👋 State: {}", coordinator.state());
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => format!("{v}"),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={count} sum={sum:.4}")
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {line}");
    }
}
