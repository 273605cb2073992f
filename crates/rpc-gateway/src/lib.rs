//! RPC Gateway Library
//!
//! Authenticates inbound RPC requests with bearer tokens verified against
//! the identity provider's JWKS, normalizes handler errors into one
//! application error taxonomy, and dispatches authenticated requests to the
//! service handlers.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs (RequestGuard) -> handlers/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS caching, token verification, request guard
//! - `config` - Service configuration from environment
//! - `errors` - Application error taxonomy and status mapping
//! - `grpc` - Tower layer guarding tonic services
//! - `handlers` - HTTP request handlers
//! - `middleware` - Axum auth and metrics middleware
//! - `models` - Request and response bodies
//! - `observability` - Metrics definitions
//! - `repositories` - Category storage and storage errors
//! - `routes` - Axum router setup
//! - `tasks` - Background key refresh

pub mod auth;
pub mod config;
pub mod errors;
pub mod grpc;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod tasks;
