//! `CategoryService` handlers.
//!
//! Repository failures are converted with [`normalize`], so storage
//! constraint violations surface as `INVALID_INPUT` or `CONFLICT`.

use crate::errors::{normalize, AppError};
use crate::middleware::{CurrentPrincipal, JsonBody};
use crate::models::{
    CategoryResponse, CreateCategoryRequest, ListCategoriesRequest, ListCategoriesResponse,
    SelectByIdRequest, SelectByShortNameRequest,
};
use crate::repositories::{NewCategory, StorageError, StorageErrorCode};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Handler for POST /api.v1.CategoryService/Create
#[instrument(skip_all, name = "gateway.categories.create")]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    JsonBody(req): JsonBody<CreateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    tracing::debug!(target: "gateway.categories", "Create category request received");

    let category = state
        .categories
        .create(
            principal.id(),
            NewCategory {
                name: req.name,
                short_name: req.short_name,
                blurb: req.blurb,
                nsfw: req.nsfw,
            },
        )
        .await
        .map_err(normalize)?;

    Ok(Json(CategoryResponse { category }))
}

/// Handler for POST /api.v1.CategoryService/List
#[instrument(skip_all, name = "gateway.categories.list")]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    JsonBody(_req): JsonBody<ListCategoriesRequest>,
) -> Json<ListCategoriesResponse> {
    Json(ListCategoriesResponse {
        categories: state.categories.list().await,
    })
}

/// Handler for POST /api.v1.CategoryService/SelectByID
#[instrument(skip_all, name = "gateway.categories.select_by_id")]
pub async fn select_category_by_id(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    JsonBody(req): JsonBody<SelectByIdRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    let id = Uuid::parse_str(req.id.trim()).map_err(|e| {
        AppError::invalid_input("category id must be a UUID")
            .with_field("id")
            .with_source(e)
    })?;

    let category = state
        .categories
        .get_by_id(id)
        .await
        .map_err(not_found_or_normalize)?;

    Ok(Json(CategoryResponse { category }))
}

/// Handler for POST /api.v1.CategoryService/SelectByShortName
#[instrument(skip_all, name = "gateway.categories.select_by_short_name")]
pub async fn select_category_by_short_name(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    JsonBody(req): JsonBody<SelectByShortNameRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    if req.short_name.trim().is_empty() {
        return Err(AppError::invalid_input("short name is required").with_field("short_name"));
    }

    let category = state
        .categories
        .get_by_short_name(&req.short_name)
        .await
        .map_err(not_found_or_normalize)?;

    Ok(Json(CategoryResponse { category }))
}

/// A lookup that found nothing is a 404 here; other failures go through
/// the generic mapping.
fn not_found_or_normalize(err: StorageError) -> AppError {
    if err.code == StorageErrorCode::NoResults {
        AppError::not_found("category not found").with_source(err)
    } else {
        normalize(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_no_results_becomes_not_found() {
        let err = not_found_or_normalize(StorageError::new(
            StorageErrorCode::NoResults,
            "category not found",
        ));
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_other_storage_errors_are_normalized() {
        let err = not_found_or_normalize(StorageError::new(
            StorageErrorCode::UniqueConflict,
            "category short name already exists",
        ));
        assert_eq!(err.code(), ErrorCode::Conflict);

        let err = not_found_or_normalize(StorageError::new(StorageErrorCode::Unknown, "boom"));
        assert_eq!(err.code(), ErrorCode::Internal);
    }
}
