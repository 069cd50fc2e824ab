//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by listener, method, status
//! - `proxy_request_duration_seconds` (histogram): forwarding latency by listener
//! - `proxy_listener_failures_total` (counter): auxiliary listeners that failed to start
//! - `primary_bind_retries_total` (counter): fallback steps taken by the primary binder
//!
//! Recording is a no-op until an exporter is installed.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_forward(listener: u16, method: &str, status: u16, start: Instant) {
    let labels = [
        ("listener", listener.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("proxy_requests_total", &labels).increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "listener" => listener.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_listener_failure(listener: u16) {
    metrics::counter!("proxy_listener_failures_total", "listener" => listener.to_string())
        .increment(1);
}
