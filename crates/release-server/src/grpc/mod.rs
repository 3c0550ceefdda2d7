//! gRPC surface of the release server.
//!
//! - [`release_service`] - `ReleaseService` routing and the `GetVersion` handler
//! - [`server`] - router assembly with the admission pipeline
//! - [`client`] - version-stamping interceptor and `GetVersion` client
//! - [`messages`] - prost messages

pub mod client;
pub mod messages;
pub mod release_service;
pub mod server;

pub use client::{ClientVersionInterceptor, VersionServiceClient};
pub use messages::{GetVersionRequest, GetVersionResponse, Version};
pub use release_service::{
    ReleaseService, ReleaseServiceServer, VersionService, GET_VERSION_PATH, SERVICE_NAME,
};
pub use server::{admission_pipeline, build_router, AdmissionPipeline, ServerOptions};
