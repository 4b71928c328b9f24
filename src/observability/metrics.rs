//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): handler latency
//! - `gateway_attempts_total` (counter): operation attempts by dependency
//! - `gateway_failures_total` (counter): failed attempts by dependency, kind
//! - `gateway_retries_total` (counter): scheduled retries by dependency
//! - `gateway_breaker_transitions_total` (counter): breaker moves by dependency, target state
//! - `gateway_breaker_rejections_total` (counter): calls refused by an open breaker
//!
//! Label values are `&'static str` or drawn from a fixed set; per-request
//! values such as request ids and client keys stay in logs.
//! - `gateway_rate_limited_total` (counter): requests refused by the limiter
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing unless `init_metrics` runs.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_owned()),
        ("route", route.to_owned()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels[..2]).record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(dependency: &'static str) {
    counter!("gateway_attempts_total", "dependency" => dependency).increment(1);
}

pub fn record_failure(dependency: &'static str, kind: &'static str) {
    counter!("gateway_failures_total", "dependency" => dependency, "kind" => kind).increment(1);
}

pub fn record_retry(dependency: &'static str) {
    counter!("gateway_retries_total", "dependency" => dependency).increment(1);
}

pub fn record_breaker_transition(dependency: &'static str, to: &'static str) {
    counter!("gateway_breaker_transitions_total", "dependency" => dependency, "to" => to).increment(1);
}

pub fn record_breaker_rejection(dependency: &'static str) {
    counter!("gateway_breaker_rejections_total", "dependency" => dependency).increment(1);
}

/// `client_kind` is `api_key`, `ip` or `anonymous`; raw identifiers never become labels.
pub fn record_rate_limited(client_kind: &'static str) {
    counter!("gateway_rate_limited_total", "client" => client_kind).increment(1);
}
