//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webrascal_requests_total` (counter): proxied requests by method, status, kind
//! - `webrascal_request_duration_seconds` (histogram): pipeline latency
//! - `webrascal_rewrites_total` (counter): rewrites by content type and outcome
//! - `webrascal_rewriter_pool_size` (gauge): pooled external rewriter instances
//! - `webrascal_pipeline_errors_total` (counter): failures by error code

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, kind: &str, start: Instant) {
    metrics::counter!(
        "webrascal_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
    metrics::histogram!("webrascal_request_duration_seconds", "kind" => kind.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rewrite(content: &'static str, outcome: &'static str) {
    metrics::counter!("webrascal_rewrites_total", "content" => content, "outcome" => outcome)
        .increment(1);
}

pub fn record_pool_size(size: usize) {
    metrics::gauge!("webrascal_rewriter_pool_size").set(size as f64);
}

pub fn record_pipeline_error(code: &'static str) {
    metrics::counter!("webrascal_pipeline_errors_total", "code" => code).increment(1);
}
