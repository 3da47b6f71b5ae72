//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): requests by method, status, handler
//! - `switchyard_request_duration_seconds` (histogram): latency distribution
//! - `switchyard_websocket_sessions` (gauge): open WebSocket sessions
//! - `switchyard_upgrades_rejected_total` (counter): upgrades with no route
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels stay low-cardinality: handler name, never raw path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, handler: &str, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("handler", handler.to_string()),
    ];
    counter!("switchyard_requests_total", &labels).increment(1);
    histogram!("switchyard_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

pub fn websocket_opened() {
    gauge!("switchyard_websocket_sessions").increment(1.0);
}

pub fn websocket_closed() {
    gauge!("switchyard_websocket_sessions").decrement(1.0);
}

pub fn upgrade_rejected() {
    counter!("switchyard_upgrades_rejected_total").increment(1);
}
