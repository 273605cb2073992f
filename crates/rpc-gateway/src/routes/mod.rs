//! HTTP routes for the RPC gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::{KeySetProvider, RequestGuard};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth};
use crate::repositories::CategoryRepository;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Guard run before every protected route.
    pub guard: Arc<RequestGuard>,

    /// Key set provider, also consulted by the readiness probe.
    pub key_sets: Arc<KeySetProvider>,

    /// Category store.
    pub categories: Arc<CategoryRepository>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (key set availability) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api.v1.GreetService/Greet` - authenticated
/// - `/api.v1.CategoryService/{Create,List,SelectByID,SelectByShortName}` - authenticated
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from configuration
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.config.request_timeout;

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/api.v1.GreetService/Greet", post(handlers::greet))
        .route(
            "/api.v1.CategoryService/Create",
            post(handlers::create_category),
        )
        .route(
            "/api.v1.CategoryService/List",
            post(handlers::list_categories),
        )
        .route(
            "/api.v1.CategoryService/SelectByID",
            post(handlers::select_category_by_id),
        )
        .route(
            "/api.v1.CategoryService/SelectByShortName",
            post(handlers::select_category_by_short_name),
        )
        .route_layer(middleware::from_fn_with_state(
            state.guard.clone(),
            require_auth,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}
