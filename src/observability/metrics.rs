//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Emit request, limiter and recovery metrics through the `metrics` facade
//! - Expose a Prometheus-compatible endpoint when enabled
//! - Keep an in-process request snapshot served at `/v1/metrics`
//!
//! # Metrics
//! - `greenlight_requests_total` (counter): requests by method, status
//! - `greenlight_request_duration_seconds` (histogram): end-to-end latency
//! - `greenlight_rate_limited_total` (counter): requests rejected by the limiter
//! - `greenlight_panics_recovered_total` (counter): handler panics turned into 500s
//! - `greenlight_background_failures_total` (counter): background tasks that failed or panicked
//! - `greenlight_tracked_clients` (gauge): clients held by the limiter registry
//! - `greenlight_evicted_clients_total` (counter): clients removed by the idle sweep

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, duration: Duration) {
    counter!(
        "greenlight_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("greenlight_request_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("greenlight_rate_limited_total").increment(1);
}

pub fn record_panic_recovered() {
    counter!("greenlight_panics_recovered_total").increment(1);
}

pub fn record_background_failure(task: &'static str, kind: &'static str) {
    counter!("greenlight_background_failures_total", "task" => task, "kind" => kind).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("greenlight_tracked_clients").set(count as f64);
}

pub fn record_evicted(count: usize) {
    counter!("greenlight_evicted_clients_total").increment(count as u64);
}

/// Request counters owned by the metrics stage of the middleware chain.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: DashMap<u16, u64>,
}

/// Point-in-time copy of [`RequestMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<u16, u64>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_sent(&self, status: u16, elapsed: Duration) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        *self.responses_by_status.entry(status).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests_received: self.requests_received.load(Ordering::Relaxed),
            total_responses_sent: self.responses_sent.load(Ordering::Relaxed),
            total_processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: self
                .responses_by_status
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}
