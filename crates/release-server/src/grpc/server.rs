//! gRPC server assembly.
//!
//! ```text
//! AdmissionLayer ─► GrpcMetricsLayer ─► ReleaseServiceServer
//! ```
//!
//! The same stack serves unary and streaming calls; tonic routes by path
//! underneath it.

use super::release_service::{ReleaseServiceServer, VersionService, GET_VERSION_PATH};
use crate::admission::{Admission, AdmissionLayer};
use crate::config::DEFAULT_MAX_MESSAGE_SIZE_BYTES;
use crate::observability::GrpcMetricsLayer;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tower::layer::util::{Identity, Stack};

/// Transport options for the gRPC server. The message limit applies in
/// both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    pub max_message_size_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_message_size_bytes: DEFAULT_MAX_MESSAGE_SIZE_BYTES,
        }
    }
}

/// Admission, then instrumentation, then the handler.
pub type AdmissionPipeline = Stack<GrpcMetricsLayer, AdmissionLayer>;

/// Compose the layers every call passes through.
#[must_use]
pub fn admission_pipeline(admission: Admission) -> AdmissionPipeline {
    Stack::new(
        GrpcMetricsLayer::new([GET_VERSION_PATH]),
        AdmissionLayer::new(admission),
    )
}

/// Build the tonic router with the admission pipeline in front of every
/// registered service.
pub fn build_router(
    admission: Admission,
    options: ServerOptions,
) -> Router<Stack<AdmissionPipeline, Identity>> {
    let release_service = ReleaseServiceServer::new(VersionService::default())
        .max_decoding_message_size(options.max_message_size_bytes)
        .max_encoding_message_size(options.max_message_size_bytes);

    Server::builder()
        .layer(admission_pipeline(admission))
        .add_service(release_service)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message_size() {
        assert_eq!(
            ServerOptions::default().max_message_size_bytes,
            20_971_520
        );
    }
}
