//! Client side of the version handshake.
//!
//! Every call made through [`ClientVersionInterceptor`] declares the
//! client's protocol version, which the server's version gate checks.
//! [`VersionServiceClient::get_version`] works even against a server on an
//! incompatible version line.

use super::messages::{GetVersionRequest, GetVersionResponse};
use super::release_service::{GET_VERSION_PATH, SERVICE_NAME};
use axum::http;
use bytes::Bytes;
use common::headers::CLIENT_VERSION;
use common::version::SERVER_VERSION;
use std::time::Duration;
use tonic::client::{Grpc, GrpcService};
use tonic::codec::ProstCodec;
use tonic::codegen::{Body, StdError};
use tonic::metadata::errors::InvalidMetadataValue;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{GrpcMethod, IntoRequest, Request, Response, Status};

/// Default connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for each RPC.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Stamps the client version on every outgoing request.
#[derive(Clone, Debug)]
pub struct ClientVersionInterceptor {
    version: MetadataValue<Ascii>,
}

impl Default for ClientVersionInterceptor {
    fn default() -> Self {
        Self {
            version: MetadataValue::from_static(SERVER_VERSION),
        }
    }
}

impl ClientVersionInterceptor {
    /// Declare `version` instead of this build's version.
    ///
    /// # Errors
    ///
    /// Returns error if `version` is not a valid ASCII metadata value.
    pub fn new(version: &str) -> Result<Self, InvalidMetadataValue> {
        Ok(Self {
            version: version.parse()?,
        })
    }
}

impl Interceptor for ClientVersionInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(CLIENT_VERSION, self.version.clone());
        Ok(request)
    }
}

/// Unary client for `ReleaseService/GetVersion`.
#[derive(Debug, Clone)]
pub struct VersionServiceClient<T> {
    inner: Grpc<T>,
}

impl VersionServiceClient<InterceptedService<Channel, ClientVersionInterceptor>> {
    /// Connect to `endpoint`, declaring the version held by `interceptor`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(
        endpoint: impl Into<String>,
        interceptor: ClientVersionInterceptor,
    ) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(endpoint.into())?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(RPC_TIMEOUT)
            .connect()
            .await?;
        Ok(Self::with_interceptor(channel, interceptor))
    }

    #[must_use]
    pub fn with_interceptor(channel: Channel, interceptor: ClientVersionInterceptor) -> Self {
        Self::new(InterceptedService::new(channel, interceptor))
    }
}

impl<T> VersionServiceClient<T>
where
    T: GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner: Grpc::new(inner),
        }
    }

    /// Ask the server for its build version.
    ///
    /// # Errors
    ///
    /// Returns the call's status on failure, including admission rejections.
    pub async fn get_version(
        &mut self,
        request: impl IntoRequest<GetVersionRequest>,
    ) -> Result<Response<GetVersionResponse>, Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e.into())))?;

        let path = http::uri::PathAndQuery::from_static(GET_VERSION_PATH);
        let mut request = request.into_request();
        request
            .extensions_mut()
            .insert(GrpcMethod::new(SERVICE_NAME, "GetVersion"));

        self.inner
            .unary(request, path, ProstCodec::default())
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_interceptor_stamps_build_version() {
        let mut interceptor = ClientVersionInterceptor::default();

        let request = interceptor.call(Request::new(())).unwrap();

        assert_eq!(
            request.metadata().get(CLIENT_VERSION).unwrap(),
            SERVER_VERSION
        );
    }

    #[test]
    fn test_interceptor_overrides_existing_header() {
        let mut interceptor = ClientVersionInterceptor::new("1.9.0").unwrap();
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert(CLIENT_VERSION, "0.0.1".parse().unwrap());

        let request = interceptor.call(request).unwrap();

        let values: Vec<_> = request.metadata().get_all(CLIENT_VERSION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(request.metadata().get(CLIENT_VERSION).unwrap(), "1.9.0");
    }

    #[test]
    fn test_interceptor_rejects_invalid_version() {
        assert!(ClientVersionInterceptor::new("2.3.0\n").is_err());
    }
}
