//! Builder patterns for test token claims
//!
//! Provides a fluent API for the claim sets the gateway expects, including
//! deliberately broken ones.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Subject used by [`TestTokenBuilder::new`].
pub const TEST_SUBJECT_ID: &str = "7d3b2c1a-5e4f-4a8b-9c0d-1e2f3a4b5c6d";

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_subject(user_id)
///     .with_role("admin")
///     .expires_in(3600)
///     .build();
/// let token = keypair.sign_token(&claims);
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    sub: Option<Value>,
    role: Option<Value>,
    exp: Option<i64>,
    iat: i64,
    nbf: Option<i64>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults: a fixed UUID subject, role
    /// `member`, expiring in an hour.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some(Value::String(TEST_SUBJECT_ID.to_string())),
            role: Some(Value::String("member".to_string())),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: now.timestamp(),
            nbf: None,
        }
    }

    /// Set the subject to a UUID
    pub fn for_subject(self, id: Uuid) -> Self {
        self.with_raw_subject(id.to_string())
    }

    /// Set the subject to an arbitrary string
    pub fn with_raw_subject(mut self, subject: impl Into<String>) -> Self {
        self.sub = Some(Value::String(subject.into()));
        self
    }

    /// Set the subject to any JSON value
    pub fn with_subject_value(mut self, subject: Value) -> Self {
        self.sub = Some(subject);
        self
    }

    /// Remove the `sub` claim
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(Value::String(role.into()));
        self
    }

    /// Set the role to any JSON value
    pub fn with_role_value(mut self, role: Value) -> Self {
        self.role = Some(role);
        self
    }

    /// Remove the `role` claim
    pub fn without_role(mut self) -> Self {
        self.role = None;
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Remove the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = Map::new();
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), sub);
        }
        if let Some(role) = self.role {
            claims.insert("role".to_string(), role);
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), Value::from(exp));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), Value::from(nbf));
        }
        claims.insert("iat".to_string(), Value::from(self.iat));
        Value::Object(claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_valid_claims() {
        let id = Uuid::new_v4();
        let claims = TestTokenBuilder::new()
            .for_subject(id)
            .with_role("admin")
            .build();

        assert_eq!(claims["sub"], id.to_string());
        assert_eq!(claims["role"], "admin");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_default() {
        let claims = TestTokenBuilder::default().build();
        assert_eq!(claims["sub"], TEST_SUBJECT_ID);
        assert_eq!(claims["role"], "member");
        assert!(claims.get("nbf").is_none());
    }

    #[test]
    fn test_builder_removes_claims() {
        let claims = TestTokenBuilder::new()
            .without_subject()
            .without_role()
            .without_expiry()
            .build();

        assert!(claims.get("sub").is_none());
        assert!(claims.get("role").is_none());
        assert!(claims.get("exp").is_none());
        assert!(claims.get("iat").is_some());
    }
}
