//! Release Server
//!
//! gRPC server for release management with request admission in front of
//! every call.
//!
//! # Servers
//!
//! - gRPC server for release clients (default: 0.0.0.0:44134)
//! - HTTP server for health probes and metrics (default: 0.0.0.0:44135)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing in the configured format
//! 3. Initialize Prometheus metrics recorder
//! 4. Start health HTTP server (liveness, readiness, metrics)
//! 5. Bind and start the gRPC server, then report ready
//! 6. Wait for shutdown signal, report not ready, drain

#![warn(clippy::pedantic)]

use std::sync::Arc;

use release_server::admission::Admission;
use release_server::config::{Config, LogFormat};
use release_server::errors::ServerError;
use release_server::grpc::build_router;
use release_server::observability::{init_metrics_recorder, observability_router, HealthState};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Configuration decides the log format, so it is read before tracing
    // is up and any error is reported once tracing is.
    let config = Config::from_env();
    init_tracing(config.as_ref().map_or(LogFormat::default(), |c| c.log_format));

    info!(version = common::version::SERVER_VERSION, "Starting Release Server");

    let config = config.map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        grpc_bind_address = %config.grpc_bind_address,
        health_bind_address = %config.health_bind_address,
        auth_proxy_enabled = config.auth_proxy_enabled,
        max_message_size_bytes = config.max_message_size_bytes,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        ServerError::Metrics(e)
    })?;

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    // Health server (fail startup if it cannot bind)
    let health_addr = config.health_bind_address;
    let health_listener = TcpListener::bind(health_addr).await.map_err(|e| {
        error!(error = %e, addr = %health_addr, "Failed to bind health server");
        ServerError::Bind {
            addr: health_addr,
            source: e,
        }
    })?;

    let app = observability_router(Arc::clone(&health_state), Some(prometheus_handle))
        .layer(TraceLayer::new_for_http());
    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // gRPC server
    let grpc_addr = config.grpc_bind_address;
    let grpc_listener = TcpListener::bind(grpc_addr).await.map_err(|e| {
        error!(error = %e, addr = %grpc_addr, "Failed to bind gRPC server");
        ServerError::Bind {
            addr: grpc_addr,
            source: e,
        }
    })?;

    let router = build_router(Admission::new(config.admission()), config.server_options());
    let grpc_shutdown_token = shutdown_token.child_token();
    let grpc_server = tokio::spawn(router.serve_with_incoming_shutdown(
        TcpListenerStream::new(grpc_listener),
        async move {
            grpc_shutdown_token.cancelled().await;
            info!("gRPC server shutting down");
        },
    ));

    health_state.set_ready();
    info!(addr = %grpc_addr, "gRPC server started");

    shutdown_signal().await;
    info!("Shutdown signal received");
    health_state.set_not_ready();
    shutdown_token.cancel();

    match grpc_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "gRPC server failed");
            return Err(ServerError::Transport(e));
        }
        Err(e) => error!(error = %e, "gRPC server task failed"),
    }

    info!("Release Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "release_server=info,release=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; the server could not be
/// stopped gracefully without them.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
