//! Application error taxonomy.
//!
//! Every handler-facing failure is an [`AppError`] carrying exactly one
//! [`ErrorCode`]. Lower-level errors are converted once through
//! [`normalize`]; an `AppError` that is normalized again comes back unchanged.
//!
//! Messages for internal failures are replaced with a generic string before
//! they reach a client. The original error is logged server-side and is
//! never serialized.

use crate::observability::metrics;
use crate::repositories::{StorageError, StorageErrorCode};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Message used when an error cannot be classified.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "unexpected_error";

/// Message returned to clients in place of internal error details.
const SANITIZED_INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Value of the `WWW-Authenticate` header on 401 responses.
pub(crate) const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"rpc-gateway\", error=\"invalid_token\"";

/// Stable application error codes.
///
/// Maps to transport statuses:
/// - NotFound: 404 / `NotFound`
/// - InvalidInput: 400 / `InvalidArgument`
/// - PermissionDenied: 403 / `PermissionDenied`
/// - Conflict: 409 / `AlreadyExists`
/// - Unauthenticated: 401 / `Unauthenticated`
/// - Internal, ContextCancelled: 500 / `Internal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    InvalidInput,
    Internal,
    PermissionDenied,
    Unauthenticated,
    ContextCancelled,
    Conflict,
}

impl ErrorCode {
    /// Machine-readable code used in response bodies and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::ContextCancelled => "CONTEXT_CANCELLED",
            ErrorCode::Conflict => "CONFLICT",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Internal | ErrorCode::ContextCancelled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn rpc_code(&self) -> tonic::Code {
        match self {
            ErrorCode::NotFound => tonic::Code::NotFound,
            ErrorCode::InvalidInput => tonic::Code::InvalidArgument,
            ErrorCode::PermissionDenied => tonic::Code::PermissionDenied,
            ErrorCode::Conflict => tonic::Code::AlreadyExists,
            ErrorCode::Unauthenticated => tonic::Code::Unauthenticated,
            ErrorCode::Internal | ErrorCode::ContextCancelled => tonic::Code::Internal,
        }
    }

    /// Whether messages with this code must be hidden from clients.
    fn is_internal(&self) -> bool {
        matches!(self, ErrorCode::Internal | ErrorCode::ContextCancelled)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StorageErrorCode> for ErrorCode {
    fn from(code: StorageErrorCode) -> Self {
        match code {
            StorageErrorCode::NotNull | StorageErrorCode::TooLong | StorageErrorCode::ForeignKey => {
                ErrorCode::InvalidInput
            }
            StorageErrorCode::UniqueConflict => ErrorCode::Conflict,
            StorageErrorCode::NoResults | StorageErrorCode::Unknown => ErrorCode::Internal,
        }
    }
}

/// Unified application error.
///
/// Cheap to clone; the wrapped cause is shared.
#[derive(Clone)]
pub struct AppError {
    code: ErrorCode,
    message: String,
    wrapped: Option<Arc<dyn StdError + Send + Sync>>,
    field: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            wrapped: None,
            field: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    pub fn context_cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ContextCancelled, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Name the request field this error refers to.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach the underlying cause. It is logged, never serialized.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let source: Box<dyn StdError + Send + Sync> = source.into();
        self.wrapped = Some(Arc::from(source));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn rpc_code(&self) -> tonic::Code {
        self.code.rpc_code()
    }

    /// Message safe to show a client.
    pub fn client_message(&self) -> &str {
        if self.code.is_internal() {
            SANITIZED_INTERNAL_MESSAGE
        } else {
            &self.message
        }
    }

    fn log_if_internal(&self) {
        if self.code.is_internal() {
            tracing::error!(
                target: "gateway.errors",
                code = %self.code,
                detail = %self.message,
                cause = ?self.wrapped.as_ref().map(|e| e.to_string()),
                "Request failed with internal error"
            );
        }
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("wrapped", &self.wrapped.as_ref().map(|e| e.to_string()))
            .field("field", &self.field)
            .finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.wrapped
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Equality ignores the wrapped cause.
impl PartialEq for AppError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.message == other.message && self.field == other.field
    }
}

impl Eq for AppError {}

/// Convert any error into an [`AppError`].
///
/// First match wins:
/// 1. An `AppError` (the error itself or anywhere in its source chain) is
///    returned unchanged.
/// 2. A [`StorageError`] in the chain has its code mapped and its message
///    kept; the original error becomes the wrapped cause.
/// 3. Anything else becomes `Internal` with [`UNEXPECTED_ERROR_MESSAGE`].
pub fn normalize<E>(err: E) -> AppError
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    let err: Box<dyn StdError + Send + Sync> = err.into();

    let err = match err.downcast::<AppError>() {
        Ok(app_error) => return *app_error,
        Err(other) => other,
    };

    if let Some(app_error) = find_in_chain::<AppError>(err.as_ref()) {
        return app_error.clone();
    }

    let storage = find_in_chain::<StorageError>(err.as_ref())
        .map(|storage| (ErrorCode::from(storage.code), storage.message.clone()));

    let (code, message) = match storage {
        Some((ErrorCode::Internal, _)) | None => {
            (ErrorCode::Internal, UNEXPECTED_ERROR_MESSAGE.to_string())
        }
        Some(mapped) => mapped,
    };

    AppError {
        code,
        message,
        wrapped: Some(Arc::from(err)),
        field: None,
    }
}

fn find_in_chain<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        normalize(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log_if_internal();
        metrics::record_app_error(self.code.as_str());

        let status = self.http_status();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code.as_str(),
                message: self.client_message(),
                field: self.field(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
            );
        }

        response
    }
}

impl From<AppError> for tonic::Status {
    fn from(err: AppError) -> Self {
        err.log_if_internal();
        metrics::record_app_error(err.code.as_str());
        tonic::Status::new(err.rpc_code(), err.client_message())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use thiserror::Error;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Handler-level error that wraps something else.
    #[derive(Debug, Error)]
    #[error("handler failed")]
    struct HandlerError(#[source] Box<dyn StdError + Send + Sync>);

    #[test]
    fn test_status_mapping_table() {
        let cases = [
            (ErrorCode::NotFound, 404, tonic::Code::NotFound),
            (ErrorCode::InvalidInput, 400, tonic::Code::InvalidArgument),
            (ErrorCode::PermissionDenied, 403, tonic::Code::PermissionDenied),
            (ErrorCode::Conflict, 409, tonic::Code::AlreadyExists),
            (ErrorCode::Unauthenticated, 401, tonic::Code::Unauthenticated),
            (ErrorCode::Internal, 500, tonic::Code::Internal),
            (ErrorCode::ContextCancelled, 500, tonic::Code::Internal),
        ];

        for (code, http, rpc) in cases {
            assert_eq!(code.http_status().as_u16(), http, "{code}");
            assert_eq!(code.rpc_code(), rpc, "{code}");
        }
    }

    #[test]
    fn test_display() {
        let err = AppError::not_found("category not found");
        assert_eq!(err.to_string(), "[NOT_FOUND] category not found");
    }

    #[test]
    fn test_normalize_app_error_is_unchanged() {
        let original = AppError::invalid_input("name is required").with_field("name");
        let normalized = normalize(original.clone());

        assert_eq!(normalized, original);
        assert_eq!(normalized.field(), Some("name"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs: Vec<Box<dyn StdError + Send + Sync>> = vec![
            Box::new(AppError::conflict("taken")),
            Box::new(StorageError::new(StorageErrorCode::TooLong, "too long")),
            Box::new(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
        ];

        for input in inputs {
            let once = normalize(input);
            let twice = normalize(once.clone());
            assert_eq!(once, twice);
            assert_eq!(once.code(), twice.code());
        }
    }

    #[test]
    fn test_normalize_finds_app_error_in_chain() {
        let err = HandlerError(Box::new(AppError::permission_denied("admins only")));
        let normalized = normalize(err);

        assert_eq!(normalized.code(), ErrorCode::PermissionDenied);
        assert_eq!(normalized.message(), "admins only");
    }

    #[test]
    fn test_normalize_storage_codes() {
        let cases = [
            (StorageErrorCode::NotNull, ErrorCode::InvalidInput),
            (StorageErrorCode::TooLong, ErrorCode::InvalidInput),
            (StorageErrorCode::ForeignKey, ErrorCode::InvalidInput),
            (StorageErrorCode::UniqueConflict, ErrorCode::Conflict),
            (StorageErrorCode::NoResults, ErrorCode::Internal),
            (StorageErrorCode::Unknown, ErrorCode::Internal),
        ];

        for (storage_code, expected) in cases {
            let normalized = normalize(StorageError::new(storage_code, "storage said no"));
            assert_eq!(normalized.code(), expected, "{storage_code}");
        }
    }

    #[test]
    fn test_normalize_unique_conflict_is_409() {
        let normalized = normalize(StorageError::new(
            StorageErrorCode::UniqueConflict,
            "short_name already exists",
        ));

        assert_eq!(normalized.code(), ErrorCode::Conflict);
        assert_eq!(normalized.http_status(), StatusCode::CONFLICT);
        assert_eq!(normalized.message(), "short_name already exists");
        assert!(normalized.source().is_some());
    }

    #[test]
    fn test_normalize_storage_internal_hides_message() {
        let normalized = normalize(StorageError::new(
            StorageErrorCode::Unknown,
            "relation \"categories\" does not exist",
        ));

        assert_eq!(normalized.code(), ErrorCode::Internal);
        assert_eq!(normalized.message(), UNEXPECTED_ERROR_MESSAGE);
    }

    #[test]
    fn test_normalize_wrapped_storage_error() {
        let err = HandlerError(Box::new(StorageError::new(
            StorageErrorCode::NotNull,
            "name must not be empty",
        )));
        let normalized = normalize(err);

        assert_eq!(normalized.code(), ErrorCode::InvalidInput);
        assert_eq!(normalized.message(), "name must not be empty");
    }

    #[test]
    fn test_normalize_unknown_error_defaults_to_internal() {
        let normalized = normalize(std::io::Error::new(
            std::io::ErrorKind::Other,
            "secret connection string",
        ));

        assert_eq!(normalized.code(), ErrorCode::Internal);
        assert_eq!(normalized.message(), UNEXPECTED_ERROR_MESSAGE);
        assert_eq!(
            normalized.source().map(ToString::to_string),
            Some("secret connection string".to_string())
        );
    }

    #[test]
    fn test_normalize_from_string() {
        let normalized = normalize("plain failure");
        assert_eq!(normalized.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_storage_error_converts_via_from() {
        let err: AppError = StorageError::new(StorageErrorCode::ForeignKey, "no such user").into();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }

    #[test]
    fn test_equality_ignores_wrapped() {
        let a = AppError::internal("x").with_source("first");
        let b = AppError::internal("x").with_source("second");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_into_response_conflict() {
        let response = AppError::conflict("short_name already exists").into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["message"], "short_name already exists");
        assert!(body["error"].get("field").is_none());
    }

    #[tokio::test]
    async fn test_into_response_includes_field() {
        let response = AppError::invalid_input("name is required")
            .with_field("name")
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
        assert_eq!(body["error"]["field"], "name");
    }

    #[tokio::test]
    async fn test_into_response_sanitizes_internal() {
        let response = AppError::internal("db password rejected")
            .with_source("driver detail")
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INTERNAL");
        assert_eq!(body["error"]["message"], "An internal error occurred");
        let rendered = body.to_string();
        assert!(!rendered.contains("password"));
        assert!(!rendered.contains("driver detail"));
    }

    #[tokio::test]
    async fn test_into_response_context_cancelled() {
        let response = AppError::context_cancelled("deadline exceeded").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "CONTEXT_CANCELLED");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_into_response_unauthenticated_has_www_authenticate() {
        let response = AppError::unauthenticated("token expired").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.starts_with("Bearer"));
    }

    #[test]
    fn test_into_tonic_status() {
        let status: tonic::Status = AppError::not_found("no such category").into();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert_eq!(status.message(), "no such category");

        let status: tonic::Status = AppError::internal("stack trace here").into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert_eq!(status.message(), "An internal error occurred");
    }
}
