//! Per-request authentication guard.
//!
//! [`RequestGuard`] combines the key set source and the token authenticator.
//! Transport adapters call [`RequestGuard::guard`] before any handler runs and
//! store the returned [`Principal`] in the request extensions. Handlers read
//! it back with [`current_principal`].

use crate::auth::authenticator::{AuthFailure, TokenAuthenticator};
use crate::auth::claims::Principal;
use crate::auth::jwks::KeySetSource;
use crate::errors::{AppError, ErrorCode, WWW_AUTHENTICATE_VALUE};
use crate::observability::metrics;
use axum::http::{header, Extensions, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Message returned to clients for every authentication failure.
const UNAUTHENTICATED_MESSAGE: &str = "authentication failed";

/// Why the guard rejected a request.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The key set could not be obtained. Rendered as an internal error.
    #[error("key set unavailable: {0}")]
    KeySetUnavailable(AppError),

    /// The token was rejected. Rendered as 401 / `Unauthenticated`.
    #[error("authentication failed: {0}")]
    Unauthenticated(#[from] AuthFailure),
}

impl GuardError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            GuardError::KeySetUnavailable(err) => err.http_status(),
            GuardError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Render as a gRPC status.
    pub fn into_status(self) -> tonic::Status {
        match self {
            GuardError::KeySetUnavailable(err) => err.into(),
            GuardError::Unauthenticated(failure) => {
                tonic::Status::unauthenticated(format!("{UNAUTHENTICATED_MESSAGE}: {}", failure.reason()))
            }
        }
    }
}

#[derive(Serialize)]
struct UnauthenticatedBody {
    error: UnauthenticatedDetail,
}

#[derive(Serialize)]
struct UnauthenticatedDetail {
    code: &'static str,
    message: &'static str,
    reason: &'static str,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        match self {
            GuardError::KeySetUnavailable(err) => err.into_response(),
            GuardError::Unauthenticated(failure) => {
                let body = UnauthenticatedBody {
                    error: UnauthenticatedDetail {
                        code: ErrorCode::Unauthenticated.as_str(),
                        message: UNAUTHENTICATED_MESSAGE,
                        reason: failure.reason(),
                    },
                };
                let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
                );
                response
            }
        }
    }
}

/// Authenticates requests before they reach a handler.
pub struct RequestGuard {
    key_sets: Arc<dyn KeySetSource>,
    authenticator: TokenAuthenticator,
    /// Upper bound on waiting for the key set.
    key_set_timeout: Duration,
}

impl RequestGuard {
    pub fn new(
        key_sets: Arc<dyn KeySetSource>,
        authenticator: TokenAuthenticator,
        key_set_timeout: Duration,
    ) -> Self {
        Self {
            key_sets,
            authenticator,
            key_set_timeout,
        }
    }

    /// Authenticate one request from its headers.
    ///
    /// # Errors
    ///
    /// - `KeySetUnavailable` when the key set fetch fails or times out
    /// - `Unauthenticated` when the token is rejected
    #[instrument(skip_all, name = "gateway.auth.guard")]
    pub async fn guard(&self, headers: &HeaderMap) -> Result<Principal, GuardError> {
        let key_set = match tokio::time::timeout(self.key_set_timeout, self.key_sets.key_set()).await
        {
            Ok(Ok(key_set)) => key_set,
            Ok(Err(e)) => {
                tracing::error!(target: "gateway.auth.guard", error = %e, "Failed to get key set");
                metrics::record_auth_attempt("key_set_unavailable");
                return Err(GuardError::KeySetUnavailable(
                    AppError::internal("failed to get key set").with_source(e),
                ));
            }
            Err(_) => {
                tracing::error!(
                    target: "gateway.auth.guard",
                    timeout_ms = self.key_set_timeout.as_millis() as u64,
                    "Timed out waiting for key set"
                );
                metrics::record_auth_attempt("key_set_timeout");
                return Err(GuardError::KeySetUnavailable(AppError::context_cancelled(
                    "timed out waiting for key set",
                )));
            }
        };

        match self.authenticator.verify(headers, &key_set) {
            Ok(principal) => {
                tracing::debug!(target: "gateway.auth.guard", role = %principal.role(), "Request authenticated");
                metrics::record_auth_attempt("success");
                Ok(principal)
            }
            Err(failure) => {
                if failure.is_token_failure() {
                    tracing::error!(target: "gateway.auth.guard", reason = failure.reason(), error = %failure, "Token rejected");
                } else {
                    tracing::warn!(target: "gateway.auth.guard", reason = failure.reason(), error = %failure, "Token claims rejected");
                }
                metrics::record_auth_attempt(failure.reason());
                Err(GuardError::Unauthenticated(failure))
            }
        }
    }
}

/// Read the principal stored by the guard.
///
/// # Errors
///
/// Returns an `Internal` error when called for a request that did not pass
/// through the guard.
pub fn current_principal(extensions: &Extensions) -> Result<Principal, AppError> {
    extensions.get::<Principal>().cloned().ok_or_else(|| {
        tracing::error!(target: "gateway.auth.guard", "Principal requested outside a guarded request");
        AppError::internal("no authenticated principal in request context")
    })
}
