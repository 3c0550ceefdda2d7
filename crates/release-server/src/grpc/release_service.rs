//! `hapi.services.tiller.ReleaseService` server.
//!
//! Only `GetVersion` is answered here; release operations are registered by
//! the deployment engine and every other method of the service reports
//! `UNIMPLEMENTED`.

use super::messages::{GetVersionRequest, GetVersionResponse, Version};
use axum::http;
use common::version::BuildInfo;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{Body, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Request, Response, Status};
use tower::Service;

/// Fully qualified gRPC service name.
pub const SERVICE_NAME: &str = "hapi.services.tiller.ReleaseService";

/// Path of the version RPC.
pub const GET_VERSION_PATH: &str = "/hapi.services.tiller.ReleaseService/GetVersion";

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// Handlers for the release service RPCs served by this process.
#[tonic::async_trait]
pub trait ReleaseService: Send + Sync + 'static {
    async fn get_version(
        &self,
        request: Request<GetVersionRequest>,
    ) -> Result<Response<GetVersionResponse>, Status>;
}

/// Answers `GetVersion` with the build metadata of this binary.
#[derive(Debug, Clone)]
pub struct VersionService {
    build: BuildInfo,
}

impl Default for VersionService {
    fn default() -> Self {
        Self::new(BuildInfo::current())
    }
}

impl VersionService {
    #[must_use]
    pub fn new(build: BuildInfo) -> Self {
        Self { build }
    }
}

#[tonic::async_trait]
impl ReleaseService for VersionService {
    async fn get_version(
        &self,
        _request: Request<GetVersionRequest>,
    ) -> Result<Response<GetVersionResponse>, Status> {
        tracing::debug!(target: "release.grpc", sem_ver = %self.build.sem_ver, "GetVersion");
        Ok(Response::new(GetVersionResponse {
            version: Some(Version::from(self.build.clone())),
        }))
    }
}

/// Routes `ReleaseService` calls to a [`ReleaseService`] implementation.
#[derive(Debug)]
pub struct ReleaseServiceServer<T> {
    inner: Arc<T>,
    max_decoding_message_size: Option<usize>,
    max_encoding_message_size: Option<usize>,
}

impl<T> ReleaseServiceServer<T> {
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<T>) -> Self {
        Self {
            inner,
            max_decoding_message_size: None,
            max_encoding_message_size: None,
        }
    }

    /// Largest inbound message accepted, in bytes.
    #[must_use]
    pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
        self.max_decoding_message_size = Some(limit);
        self
    }

    /// Largest outbound message sent, in bytes.
    #[must_use]
    pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
        self.max_encoding_message_size = Some(limit);
        self
    }
}

impl<T> Clone for ReleaseServiceServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            max_decoding_message_size: self.max_decoding_message_size,
            max_encoding_message_size: self.max_encoding_message_size,
        }
    }
}

impl<T> NamedService for ReleaseServiceServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}

struct GetVersionSvc<T>(Arc<T>);

impl<T: ReleaseService> UnaryService<GetVersionRequest> for GetVersionSvc<T> {
    type Response = GetVersionResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<GetVersionRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.get_version(request).await })
    }
}

impl<T, B> Service<http::Request<B>> for ReleaseServiceServer<T>
where
    T: ReleaseService,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        if req.uri().path() != GET_VERSION_PATH {
            let method = req.uri().path().to_string();
            return Box::pin(async move {
                Ok(Status::unimplemented(format!("method {method} is not served here")).into_http())
            });
        }

        let inner = Arc::clone(&self.inner);
        let max_decoding = self.max_decoding_message_size;
        let max_encoding = self.max_encoding_message_size;
        Box::pin(async move {
            let mut grpc = Grpc::new(ProstCodec::default())
                .apply_max_message_size_config(max_decoding, max_encoding);
            Ok(grpc.unary(GetVersionSvc(inner), req).await)
        })
    }
}
