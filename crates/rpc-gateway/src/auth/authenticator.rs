//! Bearer token verification.
//!
//! Turns the `Authorization` header of a request into a [`Principal`], given
//! the key set current at the time of the call.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The token's `alg` must belong to the selected key's family; `none` is
//!   never accepted
//! - A token naming an unknown `kid` is rejected; there is no fallback to
//!   other keys or to unverified claims
//! - `exp`, `nbf` and `iat` are optional; each is checked with clock skew
//!   tolerance when present

use crate::auth::claims::{
    string_claim, timestamp_claim, ClaimSet, ClaimValue, Principal, ROLE_CLAIM, SUBJECT_CLAIM,
};
use crate::auth::keys::{KeySet, VerificationKey};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use common::jwt::{extract_bearer_token, validate_iat, DEFAULT_CLOCK_SKEW};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Why a request failed authentication.
///
/// Every variant is terminal for the request and maps to 401 /
/// `Unauthenticated`. [`AuthFailure::reason`] is the stable machine form.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("parsing failed: no bearer token")]
    MissingToken,

    #[error("parsing failed: malformed bearer token")]
    MalformedToken,

    #[error("token signed by a key not in the key set")]
    UnknownKey,

    #[error("token signature verification failed")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("no subject claim in token")]
    NoSubject,

    #[error("no role claim in token")]
    NoRole,

    #[error("invalid id")]
    InvalidId,
}

impl AuthFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::MalformedToken => "malformed_token",
            AuthFailure::UnknownKey => "unknown_key",
            AuthFailure::InvalidSignature => "invalid_signature",
            AuthFailure::Expired => "token_expired",
            AuthFailure::NotYetValid => "token_not_yet_valid",
            AuthFailure::NoSubject => "no_subject_claim",
            AuthFailure::NoRole => "no_role_claim",
            AuthFailure::InvalidId => "invalid_id",
        }
    }

    /// True when the token itself could not be parsed or verified, as
    /// opposed to a verified token with unusable claims.
    pub fn is_token_failure(&self) -> bool {
        !matches!(
            self,
            AuthFailure::NoSubject | AuthFailure::NoRole | AuthFailure::InvalidId
        )
    }
}

/// Stateless bearer token verifier.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    clock_skew: Duration,
}

impl Default for TokenAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_SKEW)
    }
}

impl TokenAuthenticator {
    /// Create an authenticator with the given clock skew tolerance.
    pub fn new(clock_skew: Duration) -> Self {
        Self { clock_skew }
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Verify the request's bearer token against `key_set`.
    ///
    /// # Steps
    ///
    /// 1. Extract the bearer token (size-checked)
    /// 2. Select the key by `kid`, or try every key fitting `alg` when the
    ///    token has no `kid`
    /// 3. Verify signature and `exp`/`nbf`/`iat`
    /// 4. Require a subject, then a `role`, then parse the subject as a UUID
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthFailure`] encountered.
    pub fn verify(&self, headers: &HeaderMap, key_set: &KeySet) -> Result<Principal, AuthFailure> {
        let token = bearer_token(headers)?;
        let claims = self.verify_token(token, key_set)?;
        principal_from_claims(&claims)
    }

    /// Verify a raw token and return its claims.
    ///
    /// # Errors
    ///
    /// Parsing, key selection, signature and timestamp failures.
    pub fn verify_token(&self, token: &str, key_set: &KeySet) -> Result<ClaimSet, AuthFailure> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.token", error = %e, "Failed to decode token header");
            AuthFailure::MalformedToken
        })?;

        match header.kid.as_deref() {
            Some(kid) => {
                let key = key_set.get(kid).ok_or_else(|| {
                    tracing::debug!(target: "gateway.auth.token", kid = %kid, "Token kid not in key set");
                    AuthFailure::UnknownKey
                })?;
                self.decode_with(token, key, header.alg)
            }
            None => {
                let mut failure = AuthFailure::UnknownKey;
                for key in key_set.candidates(header.alg) {
                    match self.decode_with(token, key, header.alg) {
                        Ok(claims) => return Ok(claims),
                        Err(AuthFailure::InvalidSignature) => {
                            failure = AuthFailure::InvalidSignature;
                        }
                        // The signature matched; anything else is final.
                        Err(other) => return Err(other),
                    }
                }
                Err(failure)
            }
        }
    }

    fn decode_with(
        &self,
        token: &str,
        key: &VerificationKey,
        alg: Algorithm,
    ) -> Result<ClaimSet, AuthFailure> {
        if !key.supports(alg) {
            tracing::debug!(
                target: "gateway.auth.token",
                kid = ?key.kid(),
                alg = ?alg,
                "Token algorithm does not match key"
            );
            return Err(AuthFailure::InvalidSignature);
        }

        let mut validation = Validation::new(alg);
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        // Timestamps are enforced only when the token carries them
        validation.set_required_spec_claims(&[] as &[&str]);

        let data = decode::<ClaimSet>(token, key.decoding_key(), &validation).map_err(|e| {
            tracing::debug!(target: "gateway.auth.token", error = %e, "Token verification failed");
            failure_from_jwt_error(e.kind())
        })?;

        if let Some(iat) = timestamp_claim(&data.claims, "iat") {
            validate_iat(iat, self.clock_skew).map_err(|_| AuthFailure::NotYetValid)?;
        }

        Ok(data.claims)
    }
}

/// Build a principal from verified claims.
///
/// Check order: subject present, role present, subject is a UUID.
///
/// # Errors
///
/// `NoSubject`, `NoRole` or `InvalidId`.
pub fn principal_from_claims(claims: &ClaimSet) -> Result<Principal, AuthFailure> {
    let subject = match string_claim(claims, SUBJECT_CLAIM) {
        ClaimValue::Present(subject) => Some(subject),
        ClaimValue::Malformed => None,
        ClaimValue::Absent => return Err(AuthFailure::NoSubject),
    };

    let role = match string_claim(claims, ROLE_CLAIM) {
        ClaimValue::Present(role) => role,
        ClaimValue::Absent | ClaimValue::Malformed => return Err(AuthFailure::NoRole),
    };

    let id = subject
        .and_then(|subject| Uuid::parse_str(subject).ok())
        .ok_or(AuthFailure::InvalidId)?;

    Ok(Principal::new(id, role))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingToken)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedToken)?;

    extract_bearer_token(value).map_err(|e| {
        tracing::debug!(target: "gateway.auth.token", error = %e, "Invalid Authorization header");
        AuthFailure::MalformedToken
    })
}

fn failure_from_jwt_error(kind: &ErrorKind) -> AuthFailure {
    match kind {
        ErrorKind::ExpiredSignature => AuthFailure::Expired,
        ErrorKind::ImmatureSignature => AuthFailure::NotYetValid,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => AuthFailure::MalformedToken,
        _ => AuthFailure::InvalidSignature,
    }
}
