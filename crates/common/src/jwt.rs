//! JWT utilities shared across gateway crates.
//!
//! This module provides the transport-independent pieces of bearer token
//! handling:
//! - Size limits applied before any parsing
//! - Clock skew constants for `iat` validation
//! - Bearer credential extraction from an `Authorization` header value
//! - `iat` validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Error messages are generic; details are logged at debug level
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_bearer_token, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let token = extract_bearer_token(header_value)?;
//! // ... verify signature, decode claims ...
//! validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected before base64 decoding or any
/// cryptographic work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default JWT clock skew tolerance (60 seconds).
///
/// Applied as leeway to `exp`/`nbf` and as the bound on future `iat` values.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Authentication scheme accepted in the `Authorization` header.
pub const BEARER_SCHEME: &str = "Bearer";

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while locating a bearer token or checking its timestamps.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtValidationError {
    /// The header value does not use the `Bearer` scheme or has no token.
    #[error("authorization header is not a bearer credential")]
    NotBearer,

    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("token exceeds maximum size")]
    TokenTooLarge,

    /// Token `iat` claim is too far in the future.
    #[error("token issued in the future")]
    IatTooFarInFuture,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the token from an `Authorization` header value.
///
/// The scheme comparison is case-insensitive (RFC 7235). Surrounding
/// whitespace around the token is ignored; an empty token is rejected.
/// The size limit is enforced here so callers never parse oversized input.
///
/// # Errors
///
/// - `NotBearer` - scheme is not `Bearer` or the token is empty
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
pub fn extract_bearer_token(header_value: &str) -> Result<&str, JwtValidationError> {
    let (scheme, token) = header_value
        .trim_start()
        .split_once(' ')
        .ok_or(JwtValidationError::NotBearer)?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        tracing::debug!(target: "common.jwt", "Authorization scheme is not Bearer");
        return Err(JwtValidationError::NotBearer);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(JwtValidationError::NotBearer);
    }

    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    Ok(token)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` ahead of the current time.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}
