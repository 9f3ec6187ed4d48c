//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hydra_requests_total` (counter): requests by method, status, hydra
//! - `hydra_request_duration_seconds` (histogram): time to response head
//! - `hydra_dispatch_total` (counter): requests handed to a head
//! - `hydra_not_found_total` (counter): requests no head claimed
//! - `hydra_handler_failures_total` (counter): heads that errored or panicked
//! - `hydra_assertions_total` (counter): assertions by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every update is a no-op
//! - Exposition is a Prometheus scrape listener on its own address

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one served request.
pub fn record_request(method: &str, status: u16, hydra: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("hydra", hydra.to_string()),
    ];
    counter!("hydra_requests_total", &labels).increment(1);
    histogram!("hydra_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}
