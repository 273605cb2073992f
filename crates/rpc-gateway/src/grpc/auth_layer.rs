//! Tower layer authenticating gRPC requests.
//!
//! Reads the bearer token from the `authorization` metadata, runs the
//! [`RequestGuard`], and stores the [`Principal`] in the request extensions
//! before calling the wrapped service. Rejections are rendered as gRPC
//! statuses (`UNAUTHENTICATED` or `INTERNAL`) without reaching the service.

use crate::auth::{Principal, RequestGuard};
use crate::errors::AppError;
use axum::http;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};
use tracing::instrument;

/// Tower layer for gRPC authentication.
#[derive(Clone)]
pub struct GrpcAuthLayer {
    guard: Arc<RequestGuard>,
}

impl GrpcAuthLayer {
    pub fn new(guard: Arc<RequestGuard>) -> Self {
        Self { guard }
    }
}

impl<S> Layer<S> for GrpcAuthLayer {
    type Service = GrpcAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcAuthService {
            inner,
            guard: Arc::clone(&self.guard),
        }
    }
}

/// Service produced by [`GrpcAuthLayer`].
#[derive(Clone)]
pub struct GrpcAuthService<S> {
    inner: S,
    guard: Arc<RequestGuard>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for GrpcAuthService<S>
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
        // The clone may not be ready; swap so the driven instance is called
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = Arc::clone(&self.guard);

        Box::pin(async move {
            let principal = match authenticate(&guard, req.headers()).await {
                Ok(principal) => principal,
                Err(status) => return Ok(status.into_http()),
            };

            let (mut parts, body) = req.into_parts();
            parts.extensions.insert(principal);
            inner.call(http::Request::from_parts(parts, body)).await
        })
    }
}

#[instrument(skip_all, name = "gateway.grpc.auth")]
async fn authenticate(
    guard: &RequestGuard,
    headers: &http::HeaderMap,
) -> Result<Principal, Status> {
    guard.guard(headers).await.map_err(|e| {
        tracing::debug!(target: "gateway.grpc.auth", error = %e, "gRPC request rejected");
        e.into_status()
    })
}

/// Read the principal stored by [`GrpcAuthLayer`] inside a tonic handler.
///
/// # Errors
///
/// Returns an `INTERNAL` status when the service is not behind the layer.
pub fn request_principal<T>(request: &tonic::Request<T>) -> Result<Principal, Status> {
    request.extensions().get::<Principal>().cloned().ok_or_else(|| {
        tracing::error!(target: "gateway.grpc.auth", "Principal requested outside a guarded gRPC call");
        Status::from(AppError::internal(
            "no authenticated principal in request context",
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{KeySetError, KeySetSource};
    use crate::auth::keys::KeySet;
    use crate::auth::TokenAuthenticator;
    use async_trait::async_trait;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    struct StaticSource(Result<(), KeySetError>);

    #[async_trait]
    impl KeySetSource for StaticSource {
        async fn key_set(&self) -> Result<Arc<KeySet>, KeySetError> {
            self.0.clone().map(|()| Arc::new(KeySet::default()))
        }
    }

    fn layer_with(source: StaticSource) -> GrpcAuthLayer {
        GrpcAuthLayer::new(Arc::new(RequestGuard::new(
            Arc::new(source),
            TokenAuthenticator::default(),
            Duration::from_secs(1),
        )))
    }

    fn grpc_status(response: &http::Response<BoxBody>) -> tonic::Code {
        Status::from_header_map(response.headers())
            .map(|s| s.code())
            .unwrap_or(tonic::Code::Ok)
    }

    #[tokio::test]
    async fn test_missing_token_never_reaches_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let inner = tower::service_fn(move |_req: http::Request<()>| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Infallible>(http::Response::new(tonic::body::empty_body())) }
        });

        let service = layer_with(StaticSource(Ok(()))).layer(inner);
        let response = service
            .oneshot(http::Request::new(()))
            .await
            .unwrap();

        assert_eq!(grpc_status(&response), tonic::Code::Unauthenticated);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_key_set_failure_is_internal_status() {
        let inner = tower::service_fn(|_req: http::Request<()>| async {
            Ok::<_, Infallible>(http::Response::new(tonic::body::empty_body()))
        });

        let service = layer_with(StaticSource(Err(KeySetError::Timeout))).layer(inner);
        let request = http::Request::builder()
            .header("authorization", "Bearer abc.def.ghi")
            .body(())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert_eq!(grpc_status(&response), tonic::Code::Internal);
    }

    #[test]
    fn test_request_principal_outside_layer() {
        let status = request_principal(&tonic::Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }
}
