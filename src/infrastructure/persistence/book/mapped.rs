//! # Mapped Book State
//!
//! The mapped [`BookRecord`] *is* the aggregate state. Loading and saving
//! are delegated to the serde mapping; change tracking is a single
//! instance-level flag.

use crate::domain::entities::BookState;
use crate::domain::value_objects::{AggregateKey, Version};
use crate::infrastructure::persistence::book::BOOK_LAYOUT;
use crate::infrastructure::persistence::book::record::BookRecord;
use crate::infrastructure::persistence::traits::{
    BackingStore, RepositoryError, RepositoryResult, SaveOutcome,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Book state holding the whole mapped record.
#[derive(Debug)]
pub struct MappedBookState {
    key: AggregateKey,
    version: Version,
    record: BookRecord,
    modified: bool,
    store: Arc<dyn BackingStore>,
}

impl MappedBookState {
    /// Loads and maps the whole book.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn load(store: Arc<dyn BackingStore>, key: AggregateKey) -> RepositoryResult<Self> {
        let (version, record) = BookRecord::fetch(store.as_ref(), &key).await?;
        Ok(Self::new(store, key, version, record))
    }

    /// Wraps a record known to match the stored version.
    #[must_use]
    pub fn new(
        store: Arc<dyn BackingStore>,
        key: AggregateKey,
        version: Version,
        record: BookRecord,
    ) -> Self {
        Self {
            key,
            version,
            record,
            modified: false,
            store,
        }
    }

    /// Returns true if the record changed since load or the last save.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Writes the whole record if it was modified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::VersionConflict` if the stored book moved on.
    pub async fn save(&mut self) -> RepositoryResult<SaveOutcome> {
        if !self.modified {
            return Ok(SaveOutcome::Unchanged);
        }

        let values = self.record.to_fields()?;
        let fields: Vec<String> = values.keys().cloned().collect();
        let version = self
            .store
            .write(
                BOOK_LAYOUT.aggregate_type,
                &self.key,
                Some(self.version),
                values,
            )
            .await?;

        self.version = version;
        self.modified = false;
        Ok(SaveOutcome::Written { fields, version })
    }
}

#[async_trait]
impl BookState for MappedBookState {
    type Error = RepositoryError;

    fn key(&self) -> &AggregateKey {
        &self.key
    }

    async fn title(&mut self) -> Result<String, Self::Error> {
        Ok(self.record.title.clone())
    }

    async fn set_title(&mut self, title: String) -> Result<(), Self::Error> {
        self.record.title = title;
        self.modified = true;
        Ok(())
    }

    async fn author(&mut self) -> Result<String, Self::Error> {
        Ok(self.record.author.clone())
    }

    async fn content(&mut self) -> Result<String, Self::Error> {
        Ok(self.record.content.clone())
    }

    async fn set_content(&mut self, content: String) -> Result<(), Self::Error> {
        self.record.content = content;
        self.modified = true;
        Ok(())
    }
}
