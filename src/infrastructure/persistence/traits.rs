//! # Repository Traits
//!
//! Port definitions for persistence abstraction.
//!
//! - [`BackingStore`]: the storage technology seam. Stores deal in untyped
//!   [`FieldValues`] addressed by aggregate type and key.
//! - [`AggregateRepository`]: the public surface, `load` and `save`.
//!
//! # Examples
//!
//! ```ignore
//! use aggregate_repository::infrastructure::persistence::AggregateRepository;
//!
//! async fn touch<R: AggregateRepository>(repo: &R, key: &AggregateKey) {
//!     let mut aggregate = repo.load(key).await.unwrap();
//!     let outcome = repo.save(&mut aggregate).await.unwrap();
//!     assert!(!outcome.is_written());
//! }
//! ```

use crate::domain::errors::DomainError;
use crate::domain::value_objects::{AggregateKey, Version};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field values keyed by field name, in the store-neutral JSON form.
pub type FieldValues = BTreeMap<String, serde_json::Value>;

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Entity not found.
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Duplicate entity.
    #[error("Duplicate entity: {entity_type} with id {id} already exists")]
    Duplicate {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Optimistic locking conflict.
    #[error("Version conflict: {entity_type} with id {id} has been modified")]
    VersionConflict {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
        /// Expected version.
        expected: u64,
        /// Actual version.
        actual: u64,
    },

    /// Access to a field the aggregate layout does not declare.
    #[error("Unknown field: {entity_type} has no field {field}")]
    UnknownField {
        /// Type of entity.
        entity_type: &'static str,
        /// Field name.
        field: String,
    },

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error.
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a duplicate error.
    #[must_use]
    pub fn duplicate(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a version conflict error.
    #[must_use]
    pub fn version_conflict(
        entity_type: &'static str,
        id: impl Into<String>,
        expected: Version,
        actual: Version,
    ) -> Self {
        Self::VersionConflict {
            entity_type,
            id: id.into(),
            expected: expected.get(),
            actual: actual.get(),
        }
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(entity_type: &'static str, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity_type,
            field: field.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error.
    #[must_use]
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a duplicate error.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Returns true if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Fields returned by [`BackingStore::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFields {
    /// Version of the record at fetch time.
    pub version: Version,
    /// Requested fields present in the record.
    pub values: FieldValues,
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was pending; no store I/O happened.
    Unchanged,
    /// A write was issued.
    Written {
        /// Fields included in the write, in name order.
        fields: Vec<String>,
        /// Record version after the write.
        version: Version,
    },
}

impl SaveOutcome {
    /// Returns true if a write was issued.
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    /// Returns the written field names, empty when unchanged.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        match self {
            Self::Unchanged => &[],
            Self::Written { fields, .. } => fields,
        }
    }
}

/// Storage technology behind a repository.
///
/// Records are addressed by `(aggregate_type, key)` and hold a version plus a
/// set of named JSON fields. Stores do not know which fields are core or
/// deferred.
#[async_trait]
pub trait BackingStore: Send + Sync + fmt::Debug {
    /// Fetches the named fields of a record.
    ///
    /// Returns `None` if the record does not exist. An empty `fields` slice
    /// is an existence probe that still reports the version.
    async fn fetch(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        fields: &[&str],
    ) -> RepositoryResult<Option<FetchedFields>>;

    /// Inserts a new record at [`Version::INITIAL`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Duplicate` if the record already exists.
    async fn insert(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        values: FieldValues,
    ) -> RepositoryResult<Version>;

    /// Applies a partial update and returns the new version.
    ///
    /// When `expected` is given, the write only succeeds if the stored
    /// version matches it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record does not exist, and
    /// `RepositoryError::VersionConflict` if the version check fails.
    async fn write(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        expected: Option<Version>,
        changes: FieldValues,
    ) -> RepositoryResult<Version>;

    /// Deletes a record.
    ///
    /// Returns `Ok(true)` if it was deleted, `Ok(false)` if it didn't exist.
    async fn delete(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
    ) -> RepositoryResult<bool>;

    /// Counts records of one aggregate type.
    async fn count(&self, aggregate_type: &'static str) -> RepositoryResult<u64>;
}

/// Loads and saves one aggregate type as an indivisible unit.
#[async_trait]
pub trait AggregateRepository: Send + Sync + fmt::Debug {
    /// The aggregate facade handed to callers.
    type Aggregate: Send;

    /// Loads an aggregate by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no record exists for the key.
    async fn load(&self, key: &AggregateKey) -> RepositoryResult<Self::Aggregate>;

    /// Persists the pending changes of an aggregate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::VersionConflict` if the record was modified
    /// since it was loaded. Store errors propagate unchanged.
    async fn save(&self, aggregate: &mut Self::Aggregate) -> RepositoryResult<SaveOutcome>;
}
