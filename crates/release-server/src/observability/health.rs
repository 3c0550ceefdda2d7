//! Liveness and readiness probes.
//!
//! - `GET /health` - the process is up
//! - `GET /ready` - the gRPC listener is bound and not draining
//!
//! `/metrics` is mounted next to these by [`observability_router`].

use axum::{extract::State, http::StatusCode, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Probe state shared between the servers and the HTTP handlers.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Live, not yet ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Called once the gRPC listener accepts connections.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Called when shutdown starts, so load balancers stop routing here.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Router with `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

/// Router with the probes and, when a recorder is installed, `/metrics`.
pub fn observability_router(
    health_state: Arc<HealthState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Router {
    let router = health_router(health_state);
    match prometheus_handle {
        Some(handle) => router.merge(Router::new().route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )),
        None => router,
    }
}

fn probe_status(up: bool) -> StatusCode {
    if up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    probe_status(state.is_live())
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    probe_status(state.is_ready())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn get_status(router: Router, uri: &str) -> StatusCode {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");

        router
            .oneshot(request)
            .await
            .expect("Failed to execute request")
            .status()
    }

    #[test]
    fn test_health_state_starts_live_not_ready() {
        let state = HealthState::default();
        assert!(state.is_live());
        assert!(!state.is_ready());
    }

    #[test]
    fn test_health_state_ready_transitions() {
        let state = HealthState::new();

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready(), "draining server must not report ready");
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let state = Arc::new(HealthState::new());
        assert_eq!(get_status(health_router(state), "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_follows_state() {
        let state = Arc::new(HealthState::new());

        assert_eq!(
            get_status(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        assert_eq!(
            get_status(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_metrics_absent_without_recorder() {
        let state = Arc::new(HealthState::new());
        let router = observability_router(state, None);

        assert_eq!(get_status(router, "/metrics").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_served_with_recorder() {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let state = Arc::new(HealthState::new());
        let router = observability_router(state, Some(handle));

        assert_eq!(get_status(router, "/metrics").await, StatusCode::OK);
    }
}
