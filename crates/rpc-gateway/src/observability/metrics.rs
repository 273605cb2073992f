//! Metrics definitions for the RPC gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `status`: success, error, stale
//! - `outcome`: success or an authentication failure reason
//! - `code`: application error codes
//! - `endpoint`: registered routes, everything else folds into `other`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if bucket configuration fails or a recorder is already
/// installed for this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // JWKS fetches cross the network to the identity provider
        .set_buckets_for_metric(
            Matcher::Full("gateway_jwks_fetch_duration_seconds".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Routes registered by the router. Anything else is reported as `other`.
const KNOWN_ENDPOINTS: &[&str] = &[
    "/health",
    "/ready",
    "/metrics",
    "/api.v1.GreetService/Greet",
    "/api.v1.CategoryService/Create",
    "/api.v1.CategoryService/List",
    "/api.v1.CategoryService/SelectByID",
    "/api.v1.CategoryService/SelectByShortName",
];

/// Record HTTP request completion.
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code` / `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    KNOWN_ENDPOINTS
        .iter()
        .find(|known| **known == path)
        .copied()
        .unwrap_or("other")
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record a JWKS fetch attempt.
///
/// Metric: `gateway_jwks_fetches_total`, `gateway_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("gateway_jwks_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("gateway_jwks_fetches_total", "status" => status).increment(1);
}

/// Record that a stale key set was served because a refresh failed.
///
/// Metric: `gateway_jwks_stale_served_total`
pub fn record_stale_key_set_served() {
    counter!("gateway_jwks_stale_served_total").increment(1);
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of a guarded request.
///
/// Metric: `gateway_auth_attempts_total`
/// Labels: `outcome` (`success` or a failure reason such as `no_role_claim`)
pub fn record_auth_attempt(outcome: &'static str) {
    counter!("gateway_auth_attempts_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an application error rendered to a client.
///
/// Metric: `gateway_app_errors_total`
/// Labels: `code`
pub fn record_app_error(code: &'static str) {
    counter!("gateway_app_errors_total", "code" => code).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These execute the recording functions against the no-op recorder the
    // metrics facade falls back to when none is installed.

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(
            normalize_endpoint("/api.v1.GreetService/Greet"),
            "/api.v1.GreetService/Greet"
        );
        assert_eq!(normalize_endpoint("/api.v1.GreetService/Unknown"), "other");
        assert_eq!(normalize_endpoint("/random/1234"), "other");
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/api.v1.GreetService/Greet", 200, Duration::from_millis(5));
        record_http_request("GET", "/nope", 404, Duration::from_millis(1));
    }

    #[test]
    fn test_record_jwks_fetch() {
        record_jwks_fetch("success", Duration::from_millis(20));
        record_jwks_fetch("error", Duration::from_secs(10));
        record_stale_key_set_served();
    }

    #[test]
    fn test_record_auth_attempt() {
        record_auth_attempt("success");
        record_auth_attempt("no_role_claim");
        record_auth_attempt("unknown_key");
    }

    #[test]
    fn test_record_app_error() {
        record_app_error("CONFLICT");
        record_app_error("INTERNAL");
    }
}
