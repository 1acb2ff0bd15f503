//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define guard metrics (requests, rejections, faults, alerts)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `guard_requests_total` (counter): total requests by method, status
//! - `guard_request_duration_seconds` (histogram): latency distribution
//! - `guard_rejections_total` (counter): pipeline rejections by stage
//! - `guard_identity_blocks_total` (counter): clients blocked for repeated failures
//! - `guard_faults_total` (counter): captured faults by level
//! - `guard_alerts_total` (counter): raised alerts by rule
//! - `guard_critical_events_total` (counter): audit events by kind
//! - `guard_navigations_total` (counter): recorded route transitions
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for method, status, rejection stage, fault level

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exposition endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(error) => tracing::error!(%error, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "guard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!("guard_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// A request rejected by one of the defense stages.
pub fn record_rejection(stage: &'static str) {
    counter!("guard_rejections_total", "stage" => stage).increment(1);
}

pub fn record_identity_blocked() {
    counter!("guard_identity_blocks_total").increment(1);
}

pub fn record_fault(level: &str) {
    counter!("guard_faults_total", "level" => level.to_string()).increment(1);
}

pub fn record_alert(rule: &'static str) {
    counter!("guard_alerts_total", "rule" => rule).increment(1);
}

pub fn record_critical_event(kind: &str) {
    counter!("guard_critical_events_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_navigation() {
    counter!("guard_navigations_total").increment(1);
}
