//! Test server harness for E2E testing
//!
//! Provides `TestReleaseServer` for spawning real release server instances
//! in tests, listening on a random loopback port.

use common::headers::CLIENT_VERSION;
use release_server::admission::Admission;
use release_server::config::Config;
use release_server::grpc::{
    build_router, ClientVersionInterceptor, GetVersionRequest, GetVersionResponse,
    VersionServiceClient,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status};

/// Test harness for spawning the release server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_get_version_e2e() -> Result<(), anyhow::Error> {
///     let server = TestReleaseServer::spawn(false).await?;
///     let mut client = server.version_client(SERVER_VERSION).await?;
///
///     let response = client.get_version(GetVersionRequest {}).await?;
///     assert!(response.into_inner().version.is_some());
///     Ok(())
/// }
/// ```
pub struct TestReleaseServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestReleaseServer {
    /// Spawn a server with the default gates, identity enforcement on or off.
    pub async fn spawn(auth_proxy_enabled: bool) -> Result<Self, anyhow::Error> {
        let config = test_config(auth_proxy_enabled)?;
        let admission = Admission::new(config.admission());
        Self::spawn_with(config, admission).await
    }

    /// Spawn a server with a caller-built admission stack (e.g. a custom
    /// observer or version gate).
    pub async fn spawn_with(config: Config, admission: Admission) -> Result<Self, anyhow::Error> {
        let router = build_router(admission, config.server_options());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = router
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
            {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a channel to the server.
    pub async fn channel(&self) -> Result<Channel, anyhow::Error> {
        Endpoint::from_shared(self.url())?
            .connect()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to test server: {}", e))
    }

    /// `GetVersion` client declaring `client_version`.
    pub async fn version_client(
        &self,
        client_version: &str,
    ) -> Result<VersionServiceClient<InterceptedService<Channel, ClientVersionInterceptor>>, anyhow::Error>
    {
        let interceptor = ClientVersionInterceptor::new(client_version)?;
        Ok(VersionServiceClient::with_interceptor(
            self.channel().await?,
            interceptor,
        ))
    }

    /// Unary call to an arbitrary method path with raw metadata.
    ///
    /// The request body is an empty message, which decodes as any
    /// field-less request.
    pub async fn call_unary(
        &self,
        path: &str,
        metadata: &[(&'static str, &str)],
    ) -> Result<Response<GetVersionResponse>, Status> {
        let mut grpc = self.raw_client().await?;
        let path = parse_path(path)?;
        let request = with_metadata(Request::new(GetVersionRequest {}), metadata)?;

        grpc.unary(request, path, ProstCodec::default()).await
    }

    /// Client-streaming call sending `messages` empty requests.
    ///
    /// Returns the status of the call; the response stream is not read.
    pub async fn call_streaming(
        &self,
        path: &str,
        metadata: &[(&'static str, &str)],
        messages: usize,
    ) -> Result<(), Status> {
        let mut grpc = self.raw_client().await?;
        let path = parse_path(path)?;
        let outbound = tokio_stream::iter(vec![GetVersionRequest {}; messages]);
        let request = with_metadata(Request::new(outbound), metadata)?;

        grpc.streaming::<_, _, GetVersionResponse, _>(request, path, ProstCodec::default())
            .await
            .map(|_| ())
    }

    async fn raw_client(&self) -> Result<tonic::client::Grpc<Channel>, Status> {
        let channel = self
            .channel()
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        Ok(grpc)
    }
}

impl Drop for TestReleaseServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends.
        self._handle.abort();
    }
}

/// Build a config for tests: loopback addresses and default limits.
pub fn test_config(auth_proxy_enabled: bool) -> Result<Config, anyhow::Error> {
    let vars = HashMap::from([
        (
            "RELEASE_GRPC_BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        ),
        (
            "RELEASE_HEALTH_BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        ),
        (
            "RELEASE_AUTH_PROXY_ENABLED".to_string(),
            auth_proxy_enabled.to_string(),
        ),
    ]);

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

/// Metadata pair declaring `version` as the client version.
pub fn client_version(version: &str) -> (&'static str, &str) {
    (CLIENT_VERSION, version)
}

fn parse_path(path: &str) -> Result<PathAndQuery, Status> {
    PathAndQuery::try_from(path).map_err(|e| Status::invalid_argument(e.to_string()))
}

fn with_metadata<T>(
    mut request: Request<T>,
    metadata: &[(&'static str, &str)],
) -> Result<Request<T>, Status> {
    for (key, value) in metadata {
        let value: MetadataValue<Ascii> = value
            .parse()
            .map_err(|_| Status::invalid_argument(format!("invalid metadata value for {key}")))?;
        request.metadata_mut().append(*key, value);
    }
    Ok(request)
}
