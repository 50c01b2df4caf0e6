//! Metrics collection and export for Parley.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "parley_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "parley_connections_active";
    pub const EVENTS_INBOUND_TOTAL: &str = "parley_events_inbound_total";
    pub const EVENTS_INBOUND_BYTES: &str = "parley_events_inbound_bytes";
    pub const DELIVERIES_TOTAL: &str = "parley_deliveries_total";
    pub const EVENTS_DROPPED_TOTAL: &str = "parley_events_dropped_total";
    pub const ROOMS_ACTIVE: &str = "parley_rooms_active";
    pub const LATENCY_SECONDS: &str = "parley_latency_seconds";
    pub const ERRORS_TOTAL: &str = "parley_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open connections"
    );
    metrics::describe_counter!(
        names::EVENTS_INBOUND_TOTAL,
        "Inbound events accepted, by event name"
    );
    metrics::describe_counter!(
        names::EVENTS_INBOUND_BYTES,
        "Bytes of inbound events accepted"
    );
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Outbound frames handed to connections"
    );
    metrics::describe_counter!(
        names::EVENTS_DROPPED_TOTAL,
        "Inbound events dropped, by reason"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of non-empty rooms");
    metrics::describe_histogram!(
        names::LATENCY_SECONDS,
        "Event routing latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of transport errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an accepted inbound event.
pub fn record_inbound(event: &'static str, bytes: usize) {
    counter!(names::EVENTS_INBOUND_TOTAL, "event" => event).increment(1);
    counter!(names::EVENTS_INBOUND_BYTES).increment(bytes as u64);
}

/// Record frames handed to connections.
pub fn record_deliveries(count: usize) {
    counter!(names::DELIVERIES_TOTAL).increment(count as u64);
}

/// Record a dropped inbound event.
pub fn record_dropped(reason: &'static str) {
    counter!(names::EVENTS_DROPPED_TOTAL, "reason" => reason).increment(1);
}

/// Record routing latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::LATENCY_SECONDS).record(seconds);
}

/// Update active room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
