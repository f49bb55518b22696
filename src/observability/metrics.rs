//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, store mutations)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `user_service_requests_total` (counter): requests by endpoint, status
//! - `user_service_request_duration_seconds` (histogram): latency by endpoint
//! - `user_service_users_created_total` (counter)
//! - `user_service_users_deleted_total` (counter)
//! - `user_service_users` (gauge): records currently stored
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so tests and the
//!   store never need to know whether metrics are enabled

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished HTTP request.
pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    counter!(
        "user_service_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("user_service_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_user_created() {
    counter!("user_service_users_created_total").increment(1);
}

pub fn record_user_deleted() {
    counter!("user_service_users_deleted_total").increment(1);
}

pub fn set_user_count(count: usize) {
    gauge!("user_service_users").set(count as f64);
}
