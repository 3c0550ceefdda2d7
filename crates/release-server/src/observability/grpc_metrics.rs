//! Per-call gRPC server metrics.
//!
//! Sits between admission and the handler, so only admitted calls are
//! counted here. Rejections are counted by the admission layer.
//!
//! `started` is recorded when the handler is invoked. `handled` and the
//! handling time are recorded once the call's final status is known:
//!
//! - trailers-only response: the `grpc-status` of the response head
//! - streamed response: the `grpc-status` of the trailers frame, or the
//!   status of a body error
//! - response body dropped before its trailers: `Cancelled`
//! - inner service error: `Internal`

use super::metrics::{record_grpc_handled, record_grpc_started};
use crate::admission::metadata::{MethodName, UNKNOWN};
use axum::http;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tonic::body::BoxBody;
use tonic::{Code, Status};
use tower::{Layer, Service};

/// Tower layer producing [`GrpcMetricsService`].
#[derive(Clone, Debug)]
pub struct GrpcMetricsLayer {
    methods: Arc<BTreeSet<String>>,
}

impl GrpcMetricsLayer {
    /// Label calls to the full method paths in `methods` (e.g.
    /// `/pkg.Service/Method`) by name. Every other path, including unknown
    /// methods of a known service, is labelled `unknown`/`unknown`.
    #[must_use]
    pub fn new<I, T>(methods: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            methods: Arc::new(methods.into_iter().map(Into::into).collect()),
        }
    }

    fn labels(methods: &BTreeSet<String>, path: &str) -> (String, String) {
        let name = if methods.contains(path) {
            MethodName::parse(path)
        } else {
            MethodName::unknown()
        };
        (name.service.to_string(), name.method.to_string())
    }
}

impl<S> Layer<S> for GrpcMetricsLayer {
    type Service = GrpcMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcMetricsService {
            inner,
            methods: Arc::clone(&self.methods),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GrpcMetricsService<S> {
    inner: S,
    methods: Arc<BTreeSet<String>>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for GrpcMetricsService<S>
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

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let (service, method) = GrpcMetricsLayer::labels(&self.methods, req.uri().path());

        Box::pin(async move {
            record_grpc_started(&service, &method);
            let call = InFlightCall {
                service,
                method,
                start: Instant::now(),
            };

            match inner.call(req).await {
                Ok(response) => Ok(call.attach(response)),
                Err(e) => {
                    call.finish(Code::Internal);
                    Err(e)
                }
            }
        })
    }
}

/// A started call whose final status is not known yet.
#[derive(Debug)]
struct InFlightCall {
    service: String,
    method: String,
    start: Instant,
}

impl InFlightCall {
    fn finish(self, code: Code) {
        record_grpc_handled(
            &self.service,
            &self.method,
            &format!("{code:?}"),
            self.start.elapsed(),
        );
    }

    /// Record now for a trailers-only response, otherwise hand the call to
    /// the response body.
    fn attach(self, response: http::Response<BoxBody>) -> http::Response<BoxBody> {
        if let Some(code) = grpc_status(response.headers()) {
            self.finish(code);
            return response;
        }

        response.map(|body| {
            BoxBody::new(InstrumentedBody {
                inner: body,
                call: Some(self),
            })
        })
    }
}

/// Response body that records `handled` when the stream ends.
struct InstrumentedBody {
    inner: BoxBody,
    call: Option<InFlightCall>,
}

impl InstrumentedBody {
    fn finish(&mut self, code: Code) {
        if let Some(call) = self.call.take() {
            call.finish(code);
        }
    }
}

impl Body for InstrumentedBody {
    type Data = Bytes;
    type Error = Status;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(trailers) = frame.trailers_ref() {
                    // A trailers frame without a status is a broken response.
                    let code = grpc_status(trailers).unwrap_or(Code::Unknown);
                    self.finish(code);
                }
            }
            Poll::Ready(Some(Err(status))) => self.finish(status.code()),
            Poll::Ready(None) => self.finish(Code::Unknown),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for InstrumentedBody {
    fn drop(&mut self) {
        self.finish(Code::Cancelled);
    }
}

/// The `grpc-status` carried by a header or trailer map, if any.
fn grpc_status(headers: &http::HeaderMap) -> Option<Code> {
    headers
        .get("grpc-status")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i32>().ok())
        .map(Code::from_i32)
}
