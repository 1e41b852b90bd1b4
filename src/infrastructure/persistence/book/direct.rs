//! # Direct Book State
//!
//! Every write is sent to the store immediately, without a version check,
//! and saving has nothing left to do. Each field is fetched on its first
//! read only; later reads see the cached value or this instance's latest
//! write.

use crate::domain::entities::BookState;
use crate::domain::value_objects::AggregateKey;
use crate::infrastructure::persistence::book::{AUTHOR, BOOK_LAYOUT, CONTENT, TITLE};
use crate::infrastructure::persistence::traits::{
    BackingStore, FieldValues, RepositoryError, RepositoryResult, SaveOutcome,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Book state that writes through to the store on every mutation.
#[derive(Debug)]
pub struct DirectBookState {
    key: AggregateKey,
    cache: FieldValues,
    store: Arc<dyn BackingStore>,
}

impl DirectBookState {
    /// Checks that the book exists and binds to it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn load(store: Arc<dyn BackingStore>, key: AggregateKey) -> RepositoryResult<Self> {
        store
            .fetch(BOOK_LAYOUT.aggregate_type, &key, &[])
            .await?
            .ok_or_else(|| RepositoryError::not_found(BOOK_LAYOUT.aggregate_type, key.as_str()))?;
        Ok(Self::new(store, key))
    }

    /// Binds to a book without checking that it exists.
    #[must_use]
    pub fn new(store: Arc<dyn BackingStore>, key: AggregateKey) -> Self {
        Self {
            key,
            cache: FieldValues::new(),
            store,
        }
    }

    /// Nothing is ever pending.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub async fn save(&mut self) -> RepositoryResult<SaveOutcome> {
        Ok(SaveOutcome::Unchanged)
    }

    async fn read<T: DeserializeOwned>(&mut self, field: &'static str) -> RepositoryResult<T> {
        if let Some(value) = self.cache.get(field) {
            return Ok(serde_json::from_value(value.clone())?);
        }

        let mut fetched = self
            .store
            .fetch(BOOK_LAYOUT.aggregate_type, &self.key, &[field])
            .await?
            .ok_or_else(|| {
                RepositoryError::not_found(BOOK_LAYOUT.aggregate_type, self.key.as_str())
            })?;
        let value = fetched.values.remove(field).ok_or_else(|| {
            RepositoryError::serialization(format!(
                "book {} has no stored value for field {field}",
                self.key
            ))
        })?;
        self.cache.insert(field.to_string(), value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn write<T: Serialize + Sync + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> RepositoryResult<()> {
        let value = serde_json::to_value(value)?;
        let mut changes = FieldValues::new();
        changes.insert(field.to_string(), value.clone());
        let version = self
            .store
            .write(BOOK_LAYOUT.aggregate_type, &self.key, None, changes)
            .await?;
        self.cache.insert(field.to_string(), value);
        debug!(key = %self.key, field, %version, "field written through");
        Ok(())
    }
}

#[async_trait]
impl BookState for DirectBookState {
    type Error = RepositoryError;

    fn key(&self) -> &AggregateKey {
        &self.key
    }

    async fn title(&mut self) -> Result<String, Self::Error> {
        self.read(TITLE).await
    }

    async fn set_title(&mut self, title: String) -> Result<(), Self::Error> {
        self.write(TITLE, &title).await
    }

    async fn author(&mut self) -> Result<String, Self::Error> {
        self.read(AUTHOR).await
    }

    async fn content(&mut self) -> Result<String, Self::Error> {
        self.read(CONTENT).await
    }

    async fn set_content(&mut self, content: String) -> Result<(), Self::Error> {
        self.write(CONTENT, &content).await
    }
}
