//! # Book Record
//!
//! Serde-mapped representation of a stored book. The mapped and
//! snapshot strategies use it as their in-memory state.

use crate::domain::entities::NewBook;
use crate::domain::value_objects::{AggregateKey, Version};
use crate::infrastructure::persistence::book::BOOK_LAYOUT;
use crate::infrastructure::persistence::traits::{
    BackingStore, FieldValues, RepositoryError, RepositoryResult,
};
use serde::{Deserialize, Serialize};

/// Every stored field of a book, mapped by serde.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Full content.
    pub content: String,
}

impl BookRecord {
    /// Maps the record to store field values.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Serialization` if mapping fails.
    pub fn to_fields(&self) -> RepositoryResult<FieldValues> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(RepositoryError::serialization(format!(
                "book record mapped to non-object {other}"
            ))),
        }
    }

    /// Maps store field values back into a record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Serialization` if a field is missing or
    /// malformed.
    pub fn from_fields(values: FieldValues) -> RepositoryResult<Self> {
        let object: serde_json::Map<String, serde_json::Value> = values.into_iter().collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }

    /// Fetches and maps every field of a stored book.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn fetch(
        store: &dyn BackingStore,
        key: &AggregateKey,
    ) -> RepositoryResult<(Version, Self)> {
        let fields: Vec<&str> = BOOK_LAYOUT.all_fields().collect();
        let fetched = store
            .fetch(BOOK_LAYOUT.aggregate_type, key, &fields)
            .await?
            .ok_or_else(|| RepositoryError::not_found(BOOK_LAYOUT.aggregate_type, key.as_str()))?;
        Ok((fetched.version, Self::from_fields(fetched.values)?))
    }
}

impl From<NewBook> for BookRecord {
    fn from(draft: NewBook) -> Self {
        Self {
            title: draft.title().to_string(),
            author: draft.author().to_string(),
            content: draft.content().to_string(),
        }
    }
}
