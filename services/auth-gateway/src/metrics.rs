//! Prometheus metrics exposition
//!
//! Counters for the credential lifecycle, labelled by outcome:
//!
//! - `auth_token_requests_total` (counter): label `outcome`
//! - `auth_refresh_total` (counter): label `outcome`
//! - `auth_exchange_total` (counter): label `outcome`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format served on the `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a `/auth/token` request with its outcome
/// (`ok`, `consent_required`, or `error`).
pub fn record_token_request(outcome: &str) {
    metrics::counter!("auth_token_requests_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a refresh-grant attempt (`ok`, `rejected`, or `error`).
pub fn record_refresh(outcome: &str) {
    metrics::counter!("auth_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record an authorization-code exchange (`ok` or `error`).
pub fn record_exchange(outcome: &str) {
    metrics::counter!("auth_exchange_total", "outcome" => outcome.to_string()).increment(1);
}
