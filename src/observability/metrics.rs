//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Mirror the in-process registries as Prometheus metrics
//! - Expose a Prometheus-compatible scrape endpoint (optional)
//!
//! # Metrics
//! - `banme_requests_total` (counter): proxied requests by route, status
//! - `banme_request_duration_seconds` (histogram): latency by route
//! - `banme_requests_blocked_total` (counter): requests rejected by a ban
//! - `banme_bans_total` (counter): bans issued
//! - `banme_active_connections` (gauge): in-flight requests by route
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - The diagnostic report reads the registries, never these metrics

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record a completed, proxied request.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    counter!(
        "banme_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("banme_request_duration_seconds", "route" => route.to_string()).record(duration_secs);
}

/// Record a request rejected because its IP is banned.
pub fn record_blocked() {
    counter!("banme_requests_blocked_total").increment(1);
}

/// Record a ban being issued.
pub fn record_ban() {
    counter!("banme_bans_total").increment(1);
}

/// Publish the in-flight count for a route.
pub fn record_active_connections(route: &str, current: i64) {
    gauge!("banme_active_connections", "route" => route.to_string()).set(current as f64);
}
