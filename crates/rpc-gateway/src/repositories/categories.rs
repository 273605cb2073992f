//! In-memory category store.
//!
//! Enforces the same constraints a relational table would (non-null name,
//! unique and bounded short name) and reports violations as
//! [`StorageError`]s with the matching code.

use crate::models::Category;
use crate::repositories::error::{StorageError, StorageErrorCode};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

/// Maximum length of a category short name, in characters.
pub const MAX_SHORT_NAME_LENGTH: usize = 32;

/// Fields supplied when creating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub short_name: String,
    pub blurb: String,
    pub nsfw: bool,
}

/// Category repository.
#[derive(Debug, Default)]
pub struct CategoryRepository {
    rows: RwLock<HashMap<Uuid, Category>>,
}

impl CategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a category created by `created_by`.
    ///
    /// # Errors
    ///
    /// - `NotNull` if the name or short name is blank
    /// - `TooLong` if the short name exceeds [`MAX_SHORT_NAME_LENGTH`]
    /// - `UniqueConflict` if the short name is taken
    #[instrument(skip_all, name = "gateway.repo.create_category")]
    pub async fn create(
        &self,
        created_by: Uuid,
        new: NewCategory,
    ) -> Result<Category, StorageError> {
        let name = new.name.trim();
        let short_name = new.short_name.trim();

        if name.is_empty() {
            return Err(StorageError::new(
                StorageErrorCode::NotNull,
                "category name must not be empty",
            ));
        }
        if short_name.is_empty() {
            return Err(StorageError::new(
                StorageErrorCode::NotNull,
                "category short name must not be empty",
            ));
        }
        if short_name.chars().count() > MAX_SHORT_NAME_LENGTH {
            return Err(StorageError::new(
                StorageErrorCode::TooLong,
                format!("category short name must be at most {MAX_SHORT_NAME_LENGTH} characters"),
            ));
        }

        let mut rows = self.rows.write().await;
        if rows.values().any(|c| c.short_name == short_name) {
            return Err(StorageError::new(
                StorageErrorCode::UniqueConflict,
                "category short name already exists",
            ));
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            created_by,
            updated_by: created_by,
            name: name.to_string(),
            short_name: short_name.to_string(),
            blurb: new.blurb,
            nsfw: new.nsfw,
            created_at: now,
            updated_at: now,
        };
        rows.insert(category.id, category.clone());

        tracing::debug!(target: "gateway.repo.categories", category_id = %category.id, "Category created");
        Ok(category)
    }

    /// All categories, oldest first.
    pub async fn list(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.rows.read().await.values().cloned().collect();
        categories.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.short_name.cmp(&b.short_name))
        });
        categories
    }

    /// # Errors
    ///
    /// `NoResults` if no category has this id.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Category, StorageError> {
        self.rows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorCode::NoResults, "category not found"))
    }

    /// # Errors
    ///
    /// `NoResults` if no category has this short name.
    pub async fn get_by_short_name(&self, short_name: &str) -> Result<Category, StorageError> {
        let short_name = short_name.trim();
        self.rows
            .read()
            .await
            .values()
            .find(|c| c.short_name == short_name)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorCode::NoResults, "category not found"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn new_category(short_name: &str) -> NewCategory {
        NewCategory {
            name: "Board games".to_string(),
            short_name: short_name.to_string(),
            blurb: "Dice and cardboard".to_string(),
            nsfw: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = CategoryRepository::new();
        let owner = Uuid::new_v4();

        let created = repo.create(owner, new_category(" games ")).await.unwrap();
        assert_eq!(created.short_name, "games");
        assert_eq!(created.created_by, owner);
        assert_eq!(created.updated_by, owner);

        assert_eq!(repo.get_by_id(created.id).await.unwrap(), created);
        assert_eq!(repo.get_by_short_name("games").await.unwrap(), created);
        assert_eq!(repo.list().await, vec![created]);
    }

    #[tokio::test]
    async fn test_duplicate_short_name_is_unique_conflict() {
        let repo = CategoryRepository::new();
        repo.create(Uuid::new_v4(), new_category("games")).await.unwrap();

        let err = repo
            .create(Uuid::new_v4(), new_category("games"))
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::UniqueConflict);
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_fields_are_not_null() {
        let repo = CategoryRepository::new();

        let err = repo
            .create(
                Uuid::new_v4(),
                NewCategory {
                    name: "   ".to_string(),
                    ..new_category("games")
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotNull);

        let err = repo
            .create(Uuid::new_v4(), new_category(""))
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotNull);
    }

    #[tokio::test]
    async fn test_short_name_length_limit() {
        let repo = CategoryRepository::new();

        let at_limit = "a".repeat(MAX_SHORT_NAME_LENGTH);
        assert!(repo.create(Uuid::new_v4(), new_category(&at_limit)).await.is_ok());

        let over = "b".repeat(MAX_SHORT_NAME_LENGTH + 1);
        let err = repo
            .create(Uuid::new_v4(), new_category(&over))
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::TooLong);
    }

    #[tokio::test]
    async fn test_missing_rows_are_no_results() {
        let repo = CategoryRepository::new();

        let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NoResults);

        let err = repo.get_by_short_name("nope").await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NoResults);
    }
}
