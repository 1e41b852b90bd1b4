//! # Tracked Book State
//!
//! [`BookState`] over a [`LazyRecord`]. Serves both the lazy-tracking and
//! the full load/save strategies; only the record's policies differ.

use crate::domain::entities::BookState;
use crate::domain::value_objects::AggregateKey;
use crate::infrastructure::persistence::book::{AUTHOR, BOOK_LAYOUT, CONTENT, TITLE};
use crate::infrastructure::persistence::lazy_record::{LazyRecord, LoadPolicy, SavePolicy};
use crate::infrastructure::persistence::traits::{
    BackingStore, RepositoryError, RepositoryResult, SaveOutcome,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Book state backed by a lazily loaded, dirty-tracked record.
#[derive(Debug)]
pub struct TrackedBookState {
    record: LazyRecord,
}

impl TrackedBookState {
    /// Loads the book with the given policies.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn load(
        store: Arc<dyn BackingStore>,
        key: AggregateKey,
        load_policy: LoadPolicy,
        save_policy: SavePolicy,
    ) -> RepositoryResult<Self> {
        let record = LazyRecord::load(store, &BOOK_LAYOUT, key, load_policy, save_policy).await?;
        Ok(Self { record })
    }

    /// Wraps an already built record.
    #[must_use]
    pub fn from_record(record: LazyRecord) -> Self {
        Self { record }
    }

    /// Returns the underlying record.
    #[must_use]
    pub fn record(&self) -> &LazyRecord {
        &self.record
    }

    /// Writes pending changes.
    ///
    /// # Errors
    ///
    /// See [`LazyRecord::save`].
    pub async fn save(&mut self) -> RepositoryResult<SaveOutcome> {
        self.record.save().await
    }
}

#[async_trait]
impl BookState for TrackedBookState {
    type Error = RepositoryError;

    fn key(&self) -> &AggregateKey {
        self.record.key()
    }

    async fn title(&mut self) -> Result<String, Self::Error> {
        self.record.get(TITLE).await
    }

    async fn set_title(&mut self, title: String) -> Result<(), Self::Error> {
        self.record.set(TITLE, &title)
    }

    async fn author(&mut self) -> Result<String, Self::Error> {
        self.record.get(AUTHOR).await
    }

    async fn content(&mut self) -> Result<String, Self::Error> {
        self.record.get(CONTENT).await
    }

    async fn set_content(&mut self, content: String) -> Result<(), Self::Error> {
        self.record.set(CONTENT, &content)
    }
}
