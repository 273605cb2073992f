//! Middleware for the RPC gateway.
//!
//! # Components
//!
//! - `auth` - Guards protected routes and exposes the principal to handlers
//! - `http_metrics` - HTTP request metrics for every response
//! - `json` - JSON body extractor rejecting with `INVALID_INPUT`

pub mod auth;
pub mod http_metrics;
pub mod json;

pub use auth::{require_auth, CurrentPrincipal};
pub use http_metrics::http_metrics_middleware;
pub use json::JsonBody;
