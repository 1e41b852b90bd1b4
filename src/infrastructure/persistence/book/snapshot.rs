//! # Snapshot Book State
//!
//! The facade wraps a separately mapped [`BookRecord`]. Instead of flags,
//! the state keeps a copy of the field values taken at load and saves the
//! fields whose current value differs from it.

use crate::domain::entities::BookState;
use crate::domain::value_objects::{AggregateKey, Version};
use crate::infrastructure::persistence::book::BOOK_LAYOUT;
use crate::infrastructure::persistence::book::record::BookRecord;
use crate::infrastructure::persistence::traits::{
    BackingStore, FieldValues, RepositoryError, RepositoryResult, SaveOutcome,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Book state diffed against a load-time snapshot.
#[derive(Debug)]
pub struct SnapshotBookState {
    key: AggregateKey,
    version: Version,
    record: BookRecord,
    snapshot: FieldValues,
    store: Arc<dyn BackingStore>,
}

impl SnapshotBookState {
    /// Loads the book and snapshots its fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn load(store: Arc<dyn BackingStore>, key: AggregateKey) -> RepositoryResult<Self> {
        let (version, record) = BookRecord::fetch(store.as_ref(), &key).await?;
        Self::new(store, key, version, record)
    }

    /// Wraps a record known to match the stored version.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Serialization` if the snapshot cannot be
    /// taken.
    pub fn new(
        store: Arc<dyn BackingStore>,
        key: AggregateKey,
        version: Version,
        record: BookRecord,
    ) -> RepositoryResult<Self> {
        let snapshot = record.to_fields()?;
        Ok(Self {
            key,
            version,
            record,
            snapshot,
            store,
        })
    }

    /// Returns the fields whose value differs from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Serialization` if mapping fails.
    pub fn changes(&self) -> RepositoryResult<FieldValues> {
        let current = self.record.to_fields()?;
        Ok(current
            .into_iter()
            .filter(|(name, value)| self.snapshot.get(name) != Some(value))
            .collect())
    }

    /// Writes the changed fields and takes a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::VersionConflict` if the stored book moved on.
    pub async fn save(&mut self) -> RepositoryResult<SaveOutcome> {
        let changes = self.changes()?;
        if changes.is_empty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        let version = self
            .store
            .write(
                BOOK_LAYOUT.aggregate_type,
                &self.key,
                Some(self.version),
                changes.clone(),
            )
            .await?;

        self.snapshot.extend(changes);
        self.version = version;
        Ok(SaveOutcome::Written { fields, version })
    }
}

#[async_trait]
impl BookState for SnapshotBookState {
    type Error = RepositoryError;

    fn key(&self) -> &AggregateKey {
        &self.key
    }

    async fn title(&mut self) -> Result<String, Self::Error> {
        Ok(self.record.title.clone())
    }

    async fn set_title(&mut self, title: String) -> Result<(), Self::Error> {
        self.record.title = title;
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
        Ok(())
    }
}
