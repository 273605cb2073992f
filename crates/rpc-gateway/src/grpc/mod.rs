//! gRPC transport adapter.
//!
//! Any tonic service wrapped in [`GrpcAuthLayer`] is guarded by the same
//! [`crate::auth::RequestGuard`] as the HTTP routes.

pub mod auth_layer;

pub use auth_layer::{request_principal, GrpcAuthLayer, GrpcAuthService};
