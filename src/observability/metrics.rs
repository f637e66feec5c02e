//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (matches, latency, rebuilds, table size)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `router_match_total` (counter): match outcomes by `outcome`
//! - `router_match_duration_seconds` (histogram): lookup latency
//! - `router_rebuild_total` (counter): rebuilds by `result`
//! - `router_endpoints` (gauge): endpoints in the published snapshot
//! - `router_http_requests_total` (counter): responses by method, status
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Without an installed recorder every call is a no-op
//! - Histogram buckets tuned for sub-millisecond lookups

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

const MATCH_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.000_01, 0.000_025, 0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.005,
];

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    let builder = match PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full("router_match_duration_seconds".to_string()), MATCH_BUCKETS)
    {
        Ok(builder) => builder,
        Err(e) => {
            tracing::error!(error = %e, "Invalid metrics histogram configuration");
            return;
        }
    };

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus metrics exporter"),
    }
}

pub fn record_match(outcome: &'static str, start: Instant) {
    counter!("router_match_total", "outcome" => outcome).increment(1);
    histogram!("router_match_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rebuild(success: bool, endpoints: usize) {
    let result = if success { "success" } else { "failure" };
    counter!("router_rebuild_total", "result" => result).increment(1);
    gauge!("router_endpoints").set(endpoints as f64);
}

pub fn record_request(method: &str, status: u16) {
    counter!(
        "router_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
