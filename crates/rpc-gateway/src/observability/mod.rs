//! Observability for the RPC gateway.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
