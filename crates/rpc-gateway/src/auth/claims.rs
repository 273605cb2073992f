//! Claim extraction and the authenticated principal.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Verified token claims, decoded without assuming any schema.
pub type ClaimSet = Map<String, Value>;

/// Name of the custom claim carrying the principal's role.
pub const ROLE_CLAIM: &str = "role";

/// Name of the registered subject claim.
pub const SUBJECT_CLAIM: &str = "sub";

/// Result of looking up a string claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimValue<'a> {
    /// A non-empty string.
    Present(&'a str),
    /// Missing, `null`, or the empty string.
    Absent,
    /// Present with a non-string JSON type.
    Malformed,
}

/// Extract a string claim, distinguishing absence from a wrong type.
pub fn string_claim<'a>(claims: &'a ClaimSet, name: &str) -> ClaimValue<'a> {
    match claims.get(name) {
        None | Some(Value::Null) => ClaimValue::Absent,
        Some(Value::String(s)) if s.is_empty() => ClaimValue::Absent,
        Some(Value::String(s)) => ClaimValue::Present(s),
        Some(_) => ClaimValue::Malformed,
    }
}

/// Extract an integer timestamp claim (`iat`, `exp`, `nbf`).
pub fn timestamp_claim(claims: &ClaimSet, name: &str) -> Option<i64> {
    claims.get(name).and_then(Value::as_i64)
}

/// Authenticated identity for one request.
///
/// Built only by the token authenticator. The id is redacted in `Debug`
/// output.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    id: Uuid,
    role: String,
}

impl Principal {
    pub(crate) fn new(id: Uuid, role: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> ClaimSet {
        value.as_object().cloned().expect("claims must be an object")
    }

    #[test]
    fn test_string_claim_present() {
        let c = claims(json!({"role": "admin"}));
        assert_eq!(string_claim(&c, "role"), ClaimValue::Present("admin"));
    }

    #[test]
    fn test_string_claim_absent_variants() {
        let c = claims(json!({"empty": "", "null": null}));
        assert_eq!(string_claim(&c, "missing"), ClaimValue::Absent);
        assert_eq!(string_claim(&c, "empty"), ClaimValue::Absent);
        assert_eq!(string_claim(&c, "null"), ClaimValue::Absent);
    }

    #[test]
    fn test_string_claim_malformed_variants() {
        let c = claims(json!({"num": 42, "list": ["admin"], "obj": {"name": "admin"}, "flag": true}));
        for name in ["num", "list", "obj", "flag"] {
            assert_eq!(string_claim(&c, name), ClaimValue::Malformed, "{name}");
        }
    }

    #[test]
    fn test_timestamp_claim() {
        let c = claims(json!({"iat": 1_700_000_000, "exp": "soon"}));
        assert_eq!(timestamp_claim(&c, "iat"), Some(1_700_000_000));
        assert_eq!(timestamp_claim(&c, "exp"), None);
        assert_eq!(timestamp_claim(&c, "nbf"), None);
    }

    #[test]
    fn test_principal_accessors() {
        let id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let principal = Principal::new(id, "admin");

        assert_eq!(principal.id(), id);
        assert_eq!(principal.role(), "admin");
    }

    #[test]
    fn test_principal_debug_redacts_id() {
        let id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let debug = format!("{:?}", Principal::new(id, "admin"));

        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("11111111"));
    }

    #[test]
    fn test_principal_serializes_id_and_role() {
        let id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let json = serde_json::to_value(Principal::new(id, "member")).unwrap();

        assert_eq!(json["id"], "11111111-1111-1111-1111-111111111111");
        assert_eq!(json["role"], "member");
    }
}
