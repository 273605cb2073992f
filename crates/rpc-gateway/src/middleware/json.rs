//! JSON body extractor with application error rejections.
//!
//! Wraps [`axum::Json`] so a missing content type, unparseable JSON or a body
//! of the wrong shape is rejected as `INVALID_INPUT` in the standard error
//! body. Serde details are logged, not returned.

use crate::errors::AppError;
use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

/// JSON request body. Use in place of `axum::Json` in handler signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(rejection_error(rejection)),
        }
    }
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    let message = match &rejection {
        JsonRejection::MissingJsonContentType(_) => "request body must be application/json",
        JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
        JsonRejection::JsonDataError(_) => "request body does not match the expected fields",
        _ => "failed to read request body",
    };

    tracing::debug!(target: "gateway.errors", error = %rejection, "Rejected request body");

    AppError::invalid_input(message).with_source(rejection)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        routing::post,
        Router,
    };
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Named {
        name: String,
    }

    async fn echo(JsonBody(body): JsonBody<Named>) -> String {
        body.name
    }

    async fn send(content_type: Option<&str>, body: &'static str) -> (StatusCode, String, String) {
        let mut request = HttpRequest::builder().method("POST").uri("/echo");
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }

        let response = Router::new()
            .route("/echo", post(echo))
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_body_extracted() {
        let (status, _, body) = send(Some("application/json"), r#"{"name":"Ada"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Ada");
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_invalid_input() {
        let (status, content_type, body) = send(Some("application/json"), r#"{"name": 5}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("application/json"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["code"], "INVALID_INPUT");
        assert!(!body.contains("invalid type"));
    }

    #[tokio::test]
    async fn test_truncated_json_is_invalid_input() {
        let (status, _, body) = send(Some("application/json"), r#"{"name": 5"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["message"], "request body is not valid JSON");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_invalid_input() {
        let (status, _, body) = send(None, r#"{"name":"Ada"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["code"], "INVALID_INPUT");
    }
}
