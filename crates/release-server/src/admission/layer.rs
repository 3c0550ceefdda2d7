//! Tower layer that runs the admission gates ahead of the gRPC handler.
//!
//! The layer works on raw HTTP/2 requests, so the same code path admits
//! unary and streaming calls. Gates run once, when the call future is
//! first polled, before the inner service sees the request. A rejected
//! call is answered with a trailers-only gRPC status and the inner service
//! is never called.

use super::auth_gate::{AuthGate, ForwardedIdentity};
use super::metadata::CallContext;
use super::observer::{AdmissionObserver, TracingObserver};
use super::version_gate::VersionGate;
use super::AdmissionConfig;
use crate::errors::AdmissionError;
use crate::observability::metrics::record_admission_rejection;
use axum::http;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};

/// Both gates plus the observer they report to.
///
/// Immutable once built and shared by every connection.
#[derive(Clone)]
pub struct Admission {
    version_gate: VersionGate,
    auth_gate: AuthGate,
    observer: Arc<dyn AdmissionObserver>,
}

impl Admission {
    /// Gates for `config`, checking against the build version and logging
    /// through `tracing`.
    #[must_use]
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            version_gate: VersionGate::default(),
            auth_gate: AuthGate::new(config),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_version_gate(mut self, version_gate: VersionGate) -> Self {
        self.version_gate = version_gate;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AdmissionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run the version gate, then the auth gate.
    ///
    /// The first failure wins. An exempt version mismatch still goes on to
    /// the auth gate.
    pub fn admit(&self, ctx: &CallContext<'_>) -> Result<ForwardedIdentity, AdmissionError> {
        self.version_gate.check(ctx, self.observer.as_ref())?;
        let identity = self.auth_gate.check(ctx, self.observer.as_ref())?;
        Ok(identity)
    }
}

impl fmt::Debug for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Admission")
            .field("version_gate", &self.version_gate)
            .field("auth_gate", &self.auth_gate)
            .finish_non_exhaustive()
    }
}

/// Tower layer producing [`AdmissionService`].
#[derive(Clone, Debug)]
pub struct AdmissionLayer {
    admission: Arc<Admission>,
}

impl AdmissionLayer {
    #[must_use]
    pub fn new(admission: Admission) -> Self {
        Self {
            admission: Arc::new(admission),
        }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            admission: Arc::clone(&self.admission),
        }
    }
}

/// Admits or rejects each call before handing it to `S`.
///
/// Admitted calls carry their [`ForwardedIdentity`] in the request
/// extensions.
#[derive(Clone, Debug)]
pub struct AdmissionService<S> {
    inner: S,
    admission: Arc<Admission>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for AdmissionService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<ReqBody>) -> Self::Future {
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let admission = Arc::clone(&self.admission);

        Box::pin(async move {
            let decision = admission.admit(&CallContext::from_request(&req));

            match decision {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    inner.call(req).await
                }
                Err(err) => {
                    record_admission_rejection(err.reason());
                    Ok(Status::from(err).into_http())
                }
            }
        })
    }
}
