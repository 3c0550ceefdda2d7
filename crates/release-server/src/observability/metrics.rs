//! Metrics definitions for the release server.
//!
//! All metrics follow Prometheus naming conventions:
//! - `release_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `grpc_service`, `grpc_method`: registered method paths only, everything
//!   else is `unknown` (see [`super::grpc_metrics::GrpcMetricsLayer`])
//! - `grpc_code`: the 17 gRPC status codes
//! - `reason`: `version_mismatch`, `unauthorized`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to
/// render `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Release operations range from metadata lookups to chart installs
        .set_buckets_for_metric(
            Matcher::Prefix("release_grpc_server_handling".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set gRPC handling buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// gRPC Server Metrics
// ============================================================================

/// Record that an admitted call reached the handler.
///
/// Metric: `release_grpc_server_started_total`
/// Labels: `grpc_service`, `grpc_method`
pub fn record_grpc_started(service: &str, method: &str) {
    counter!(
        "release_grpc_server_started_total",
        "grpc_service" => service.to_string(),
        "grpc_method" => method.to_string()
    )
    .increment(1);
}

/// Record the final status of a call and its handling time.
///
/// Metric: `release_grpc_server_handled_total`, `release_grpc_server_handling_seconds`
/// Labels: `grpc_service`, `grpc_method`, `grpc_code` (counter only)
pub fn record_grpc_handled(service: &str, method: &str, code: &str, duration: Duration) {
    histogram!(
        "release_grpc_server_handling_seconds",
        "grpc_service" => service.to_string(),
        "grpc_method" => method.to_string()
    )
    .record(duration.as_secs_f64());

    counter!(
        "release_grpc_server_handled_total",
        "grpc_service" => service.to_string(),
        "grpc_method" => method.to_string(),
        "grpc_code" => code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Admission Metrics
// ============================================================================

/// Record a call turned away by an admission gate.
///
/// Metric: `release_admission_rejections_total`
/// Labels: `reason`
pub fn record_admission_rejection(reason: &'static str) {
    counter!("release_admission_rejections_total", "reason" => reason).increment(1);
}
