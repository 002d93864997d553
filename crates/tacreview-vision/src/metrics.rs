//! Vision client metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops unless the
//! embedding process installs a recorder.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total vision requests by status.
    pub const REQUESTS_TOTAL: &str = "tacreview_vision_requests_total";

    /// Total retry attempts.
    pub const RETRIES_TOTAL: &str = "tacreview_vision_retries_total";

    /// Model scores clamped into 0-100.
    pub const SCORE_CLAMPED_TOTAL: &str = "tacreview_vision_score_clamped_total";

    /// Responses that failed parsing or schema validation.
    pub const PARSE_FAILURES_TOTAL: &str = "tacreview_vision_parse_failures_total";

    /// Request latency in seconds.
    pub const LATENCY_SECONDS: &str = "tacreview_vision_latency_seconds";
}

/// Record a completed vision request. `status` is the HTTP status, or
/// `"network"` when no response arrived.
pub fn record_request(status: &str, latency_ms: f64) {
    counter!(names::REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(names::LATENCY_SECONDS).record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_score_clamped() {
    counter!(names::SCORE_CLAMPED_TOTAL).increment(1);
}

pub fn record_parse_failure() {
    counter!(names::PARSE_FAILURES_TOTAL).increment(1);
}
