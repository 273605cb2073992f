//! Background tasks for the RPC gateway.
//!
//! # Tasks
//!
//! - `key_refresh` - Re-fetches the JWKS document on an interval

pub mod key_refresh;

pub use key_refresh::start_key_refresh;
