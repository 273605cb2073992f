//! Repository layer for the RPC gateway.
//!
//! Repositories report failures as [`StorageError`]; handlers pass them
//! through [`crate::errors::normalize`].

pub mod categories;
pub mod error;

pub use categories::{CategoryRepository, NewCategory, MAX_SHORT_NAME_LENGTH};
pub use error::{StorageError, StorageErrorCode};
