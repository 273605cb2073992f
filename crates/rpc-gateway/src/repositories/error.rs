//! Storage-layer error shape.
//!
//! Repositories report failures as [`StorageError`]. Handlers never match on
//! these directly; they pass through [`crate::errors::normalize`], which maps
//! the storage code onto the application taxonomy.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Classification of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorCode {
    /// A required column was left empty.
    NotNull,
    /// A uniqueness constraint was violated.
    UniqueConflict,
    /// A value exceeded its column length.
    TooLong,
    /// A referenced row does not exist.
    ForeignKey,
    /// A query expected a row and found none.
    NoResults,
    /// Anything the repository could not classify.
    Unknown,
}

impl StorageErrorCode {
    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageErrorCode::NotNull => "NOT_NULL_CONFLICT",
            StorageErrorCode::UniqueConflict => "UNIQUE_CONFLICT",
            StorageErrorCode::TooLong => "TOO_LONG_CONFLICT",
            StorageErrorCode::ForeignKey => "FOREIGN_KEY_CONFLICT",
            StorageErrorCode::NoResults => "NO_RESULTS",
            StorageErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by repositories.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub message: String,
    #[source]
    pub wrapped: Option<Box<dyn StdError + Send + Sync>>,
}

impl StorageError {
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            wrapped: None,
        }
    }

    /// Attach the driver-level error that caused this failure.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.wrapped = Some(source.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_message() {
        let err = StorageError::new(StorageErrorCode::UniqueConflict, "short_name taken");
        assert_eq!(err.to_string(), "[UNIQUE_CONFLICT] short_name taken");
    }

    #[test]
    fn test_source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = StorageError::new(StorageErrorCode::Unknown, "query failed").with_source(io);

        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "socket closed");
    }

    #[test]
    fn test_codes_have_distinct_names() {
        let codes = [
            StorageErrorCode::NotNull,
            StorageErrorCode::UniqueConflict,
            StorageErrorCode::TooLong,
            StorageErrorCode::ForeignKey,
            StorageErrorCode::NoResults,
            StorageErrorCode::Unknown,
        ];
        let names: std::collections::HashSet<_> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(names.len(), codes.len());
    }
}
