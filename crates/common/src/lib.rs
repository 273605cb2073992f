//! Common utilities shared across the RPC gateway crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (bearer extraction, size limits, clock skew)
pub mod jwt;
