//! Pipeline metrics
//!
//! Emits through the `metrics` facade:
//!
//! - `client_requests_total` (counter): labels `status`, `method`
//! - `client_renewals_total` (counter): label `outcome`
//!
//! Recorder installation (Prometheus or otherwise) is the host
//! application's concern; without one these calls are no-ops.

/// Record a completed request with status code and HTTP method labels.
pub(crate) fn record_request(status: u16, method: &str) {
    metrics::counter!(
        "client_requests_total",
        "status" => status.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Record a settled renewal cycle.
pub(crate) fn record_renewal(outcome: &str) {
    metrics::counter!("client_renewals_total", "outcome" => outcome.to_string()).increment(1);
}
