//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that verification keys are available

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does not check dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Ready when the cached key set is fresh, or when a fetch right now
/// succeeds. Returns 503 otherwise, since every protected request would
/// fail with an internal error.
///
/// Error messages are generic; the fetch error is logged server-side.
#[tracing::instrument(skip_all, name = "gateway.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.key_sets.is_fresh().await {
        return (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                key_set: "fresh",
                error: None,
            }),
        );
    }

    match state.key_sets.get_key_set().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                key_set: "refreshed",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "gateway.health", error = %e, "Readiness check failed: key set unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    key_set: "unavailable",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    // Readiness against a live JWKS endpoint is covered in the integration
    // tests.
}
