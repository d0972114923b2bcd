//! Prometheus metrics for server health.
//!
//! The exporter serves the scrape endpoint on its own listener so the game
//! port never mixes with monitoring traffic.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter. Metrics are served at
/// `http://<addr>/metrics`.
pub fn init(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))
}

/// Count an HTTP request by method, path, and status.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the current live WebSocket connection count.
pub fn websocket_connections_active(count: u64) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}

/// Count a new WebSocket connection.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// Count an inbound client event.
pub fn websocket_events_received() {
    metrics::counter!("websocket_events_received").increment(1);
}

/// Count a created room.
pub fn rooms_created_total() {
    metrics::counter!("rooms_created_total").increment(1);
}

/// Count an issued anonymous token.
pub fn anonymous_tokens_issued() {
    metrics::counter!("anonymous_tokens_issued").increment(1);
}
