//! HTTP request metrics middleware.
//!
//! Applied as the outermost layer so it sees every response, including
//! framework-level rejections (404, 405), request body rejections and
//! responses produced by the auth guard.

use crate::observability::metrics::record_http_request;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Record method, endpoint, status and duration for every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    async fn greet() -> &'static str {
        "hello"
    }

    fn test_app() -> Router {
        Router::new()
            .route("/api.v1.GreetService/Greet", post(greet))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    #[tokio::test]
    async fn test_middleware_passes_response_through() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api.v1.GreetService/Greet")
            .body(Body::empty())
            .expect("request builder should succeed");

        let response = test_app()
            .oneshot(request)
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_sees_framework_rejections() {
        let not_found = HttpRequest::builder()
            .method("POST")
            .uri("/api.v1.GreetService/Nope")
            .body(Body::empty())
            .expect("request builder should succeed");
        let wrong_method = HttpRequest::builder()
            .method("GET")
            .uri("/api.v1.GreetService/Greet")
            .body(Body::empty())
            .expect("request builder should succeed");

        let response = test_app()
            .oneshot(not_found)
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = test_app()
            .oneshot(wrong_method)
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
