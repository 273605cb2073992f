//! RPC gateway models.
//!
//! Request and response bodies for the JSON RPC endpoints, plus the stored
//! category record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Greet Service
// ============================================================================

/// Body of `GreetService.Greet`.
#[derive(Debug, Clone, Deserialize)]
pub struct GreetRequest {
    #[serde(default)]
    pub greet: Greet,
}

/// Caller-supplied greeting payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Greet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetResponse {
    pub msg: String,
}

// ============================================================================
// Category Service
// ============================================================================

/// Stored category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub name: String,
    pub short_name: String,
    pub blurb: String,
    pub nsfw: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `CategoryService.Create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub blurb: String,
    #[serde(default)]
    pub nsfw: bool,
}

/// Response for every endpoint returning a single category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: Category,
}

/// Body of `CategoryService.List`. Accepts `{}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCategoriesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCategoriesResponse {
    pub categories: Vec<Category>,
}

/// Body of `CategoryService.SelectByID`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectByIdRequest {
    #[serde(default)]
    pub id: String,
}

/// Body of `CategoryService.SelectByShortName`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectByShortNameRequest {
    #[serde(default)]
    pub short_name: String,
}

// ============================================================================
// Operational Endpoints
// ============================================================================

/// Readiness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Key set status ("fresh", "refreshed" or "unavailable").
    pub key_set: &'static str,

    /// Error message if not ready. Never includes internal details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_greet_request_tolerates_missing_fields() {
        let req: GreetRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.greet.id, "");
        assert_eq!(req.greet.name, "");

        let req: GreetRequest =
            serde_json::from_str(r#"{"greet":{"id":"42","name":"Ada"}}"#).unwrap();
        assert_eq!(req.greet.id, "42");
        assert_eq!(req.greet.name, "Ada");
    }

    #[test]
    fn test_create_category_request_defaults() {
        let req: CreateCategoryRequest =
            serde_json::from_str(r#"{"name":"Board games"}"#).unwrap();
        assert_eq!(req.name, "Board games");
        assert_eq!(req.short_name, "");
        assert!(!req.nsfw);
    }

    #[test]
    fn test_readiness_response_omits_empty_error() {
        let ready = ReadinessResponse {
            status: "ready",
            key_set: "fresh",
            error: None,
        };
        let json = serde_json::to_string(&ready).unwrap();
        assert!(!json.contains("error"));
    }
}
