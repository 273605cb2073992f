//! Authentication middleware for protected routes.
//!
//! `require_auth` runs the [`RequestGuard`] and stores the resulting
//! [`Principal`] in the request extensions. Handlers receive it through the
//! [`CurrentPrincipal`] extractor.

use crate::auth::{current_principal, GuardError, Principal, RequestGuard};
use crate::errors::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware.
///
/// # Response
///
/// - 401 Unauthorized with a failure reason if the token is rejected
/// - 500 Internal Server Error if the key set is unavailable
/// - Continues to the next handler with a `Principal` in extensions otherwise
#[instrument(skip_all, name = "gateway.middleware.auth")]
pub async fn require_auth(
    State(guard): State<Arc<RequestGuard>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GuardError> {
    let principal = guard.guard(req.headers()).await?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated principal.
///
/// Rejects with an internal error when the route is not behind
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_principal(&parts.extensions).map(CurrentPrincipal)
    }
}
