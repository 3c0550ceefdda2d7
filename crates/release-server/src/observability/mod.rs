//! Observability for the release server.
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `release_grpc_server_started_total` | Counter | `grpc_service`, `grpc_method` |
//! | `release_grpc_server_handled_total` | Counter | `grpc_service`, `grpc_method`, `grpc_code` |
//! | `release_grpc_server_handling_seconds` | Histogram | `grpc_service`, `grpc_method` |
//! | `release_admission_rejections_total` | Counter | `reason` |
//!
//! Identity headers are never used as labels or span fields outside the
//! admission log records.

pub mod grpc_metrics;
pub mod health;
pub mod metrics;

pub use grpc_metrics::{GrpcMetricsLayer, GrpcMetricsService};
pub use health::{health_router, observability_router, HealthState};
pub use metrics::init_metrics_recorder;
