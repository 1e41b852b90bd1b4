//! # Unit of Work
//!
//! Transaction-scoped identity map over any [`AggregateRepository`].
//!
//! Within one unit of work, loading the same key twice returns the same
//! instance, so in-memory changes made through one handle are visible
//! through the other. [`UnitOfWork::commit`] saves every loaded aggregate;
//! dropping the unit discards them. Nothing outlives the unit.
//!
//! # Examples
//!
//! ```ignore
//! let mut uow = UnitOfWork::new(&repo);
//! let first = uow.load(&key).await?;
//! let second = uow.load(&key).await?; // same instance, no store I/O
//! first.lock().await.revise("new text").await?;
//! assert_eq!(second.lock().await.read().await?, "new text");
//! uow.commit().await?;
//! ```

use crate::domain::value_objects::AggregateKey;
use crate::infrastructure::persistence::traits::{
    AggregateRepository, RepositoryResult, SaveOutcome,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared handle to an aggregate tracked by a [`UnitOfWork`].
pub type Shared<A> = Arc<Mutex<A>>;

/// Identity map and commit scope for one transaction.
pub struct UnitOfWork<'r, R: AggregateRepository> {
    repository: &'r R,
    loaded: BTreeMap<AggregateKey, Shared<R::Aggregate>>,
}

impl<R: AggregateRepository> std::fmt::Debug for UnitOfWork<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("repository", self.repository)
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<'r, R: AggregateRepository> UnitOfWork<'r, R> {
    /// Starts an empty unit of work.
    #[must_use]
    pub fn new(repository: &'r R) -> Self {
        Self {
            repository,
            loaded: BTreeMap::new(),
        }
    }

    /// Returns the aggregate for `key`, loading it on first request.
    ///
    /// # Errors
    ///
    /// Propagates the repository's load error.
    pub async fn load(&mut self, key: &AggregateKey) -> RepositoryResult<Shared<R::Aggregate>> {
        if let Some(existing) = self.loaded.get(key) {
            debug!(key = %key, "identity map hit");
            return Ok(Arc::clone(existing));
        }

        let aggregate = Arc::new(Mutex::new(self.repository.load(key).await?));
        self.loaded.insert(key.clone(), Arc::clone(&aggregate));
        Ok(aggregate)
    }

    /// Returns true if `key` was loaded in this unit.
    #[must_use]
    pub fn contains(&self, key: &AggregateKey) -> bool {
        self.loaded.contains_key(key)
    }

    /// Number of aggregates loaded in this unit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Returns true if nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Saves every loaded aggregate in key order and ends the unit.
    ///
    /// Waits for each aggregate's lock, so handles must not be held locked
    /// across the call.
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first save error. Aggregates saved before
    /// the failure stay saved.
    pub async fn commit(self) -> RepositoryResult<Vec<(AggregateKey, SaveOutcome)>> {
        let mut outcomes = Vec::with_capacity(self.loaded.len());
        for (key, aggregate) in self.loaded {
            let mut guard = aggregate.lock().await;
            let outcome = self.repository.save(&mut guard).await?;
            outcomes.push((key, outcome));
        }
        debug!(saved = outcomes.len(), "unit of work committed");
        Ok(outcomes)
    }

    /// Discards every loaded aggregate without saving.
    pub fn rollback(self) {
        debug!(discarded = self.loaded.len(), "unit of work rolled back");
    }
}
