//! # Book Persistence
//!
//! [`BookRepository`] loads and saves [`Book`] aggregates with any
//! [`PersistenceStrategy`].
//!
//! Each strategy has its own [`BookState`] implementation:
//!
//! - [`TrackedBookState`]: lazy tracking and full load/save
//! - [`MappedBookState`]: serde-mapped record as the state
//! - [`SnapshotBookState`]: mapped record diffed against a load snapshot
//! - [`DirectBookState`]: writes go straight to the store, reads are cached
//!
//! [`PersistedBook`] wraps whichever one the repository built, so callers
//! deal with a single `Book<PersistedBook>` type.
//!
//! # Examples
//!
//! ```ignore
//! let repo = BookRepository::new(store, PersistenceStrategy::LazyTracking);
//! let mut book = repo.load(&key).await?;
//! book.record_reading(Timestamp::now()).await?;
//! let outcome = repo.save(&mut book).await?; // writes `content` only
//! ```

pub mod direct;
pub mod mapped;
pub mod record;
pub mod snapshot;
pub mod tracked;

pub use direct::DirectBookState;
pub use mapped::MappedBookState;
pub use record::BookRecord;
pub use snapshot::SnapshotBookState;
pub use tracked::TrackedBookState;

use crate::config::RepositoryConfig;
use crate::domain::entities::{Book, BookState, NewBook};
use crate::domain::value_objects::AggregateKey;
use crate::infrastructure::persistence::lazy_record::{
    FieldLayout, LazyRecord, LoadPolicy, SavePolicy,
};
use crate::infrastructure::persistence::strategy::PersistenceStrategy;
use crate::infrastructure::persistence::traits::{
    AggregateRepository, BackingStore, RepositoryError, RepositoryResult, SaveOutcome,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stored name of the title field.
pub const TITLE: &str = "title";
/// Stored name of the author field.
pub const AUTHOR: &str = "author";
/// Stored name of the content field.
pub const CONTENT: &str = "content";

/// Field layout of a stored book: title and author are core, content is
/// deferred.
pub static BOOK_LAYOUT: FieldLayout = FieldLayout::new("book", &[TITLE, AUTHOR], &[&[CONTENT]]);

/// The state behind a book handed out by [`BookRepository`].
#[derive(Debug)]
pub enum PersistedBook {
    /// Lazy tracking or full load/save.
    Tracked(TrackedBookState),
    /// Mapped record.
    Mapped(MappedBookState),
    /// Mapped record with snapshot diffing.
    Snapshot(SnapshotBookState),
    /// Direct store access.
    Direct(DirectBookState),
}

impl PersistedBook {
    /// Writes whatever the state has pending.
    ///
    /// # Errors
    ///
    /// Propagates the state's save error.
    pub async fn save(&mut self) -> RepositoryResult<SaveOutcome> {
        match self {
            Self::Tracked(state) => state.save().await,
            Self::Mapped(state) => state.save().await,
            Self::Snapshot(state) => state.save().await,
            Self::Direct(state) => state.save().await,
        }
    }
}

#[async_trait]
impl BookState for PersistedBook {
    type Error = RepositoryError;

    fn key(&self) -> &AggregateKey {
        match self {
            Self::Tracked(state) => state.key(),
            Self::Mapped(state) => state.key(),
            Self::Snapshot(state) => state.key(),
            Self::Direct(state) => state.key(),
        }
    }

    async fn title(&mut self) -> Result<String, Self::Error> {
        match self {
            Self::Tracked(state) => state.title().await,
            Self::Mapped(state) => state.title().await,
            Self::Snapshot(state) => state.title().await,
            Self::Direct(state) => state.title().await,
        }
    }

    async fn set_title(&mut self, title: String) -> Result<(), Self::Error> {
        match self {
            Self::Tracked(state) => state.set_title(title).await,
            Self::Mapped(state) => state.set_title(title).await,
            Self::Snapshot(state) => state.set_title(title).await,
            Self::Direct(state) => state.set_title(title).await,
        }
    }

    async fn author(&mut self) -> Result<String, Self::Error> {
        match self {
            Self::Tracked(state) => state.author().await,
            Self::Mapped(state) => state.author().await,
            Self::Snapshot(state) => state.author().await,
            Self::Direct(state) => state.author().await,
        }
    }

    async fn content(&mut self) -> Result<String, Self::Error> {
        match self {
            Self::Tracked(state) => state.content().await,
            Self::Mapped(state) => state.content().await,
            Self::Snapshot(state) => state.content().await,
            Self::Direct(state) => state.content().await,
        }
    }

    async fn set_content(&mut self, content: String) -> Result<(), Self::Error> {
        match self {
            Self::Tracked(state) => state.set_content(content).await,
            Self::Mapped(state) => state.set_content(content).await,
            Self::Snapshot(state) => state.set_content(content).await,
            Self::Direct(state) => state.set_content(content).await,
        }
    }
}

/// Repository adapter for [`Book`] aggregates.
#[derive(Clone)]
pub struct BookRepository {
    store: Arc<dyn BackingStore>,
    strategy: PersistenceStrategy,
}

impl fmt::Debug for BookRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookRepository")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl BookRepository {
    /// Creates a repository over a store.
    #[must_use]
    pub fn new(store: Arc<dyn BackingStore>, strategy: PersistenceStrategy) -> Self {
        Self { store, strategy }
    }

    /// Creates a repository using the configured strategy.
    #[must_use]
    pub fn from_config(store: Arc<dyn BackingStore>, config: &RepositoryConfig) -> Self {
        Self::new(store, config.strategy)
    }

    /// Returns the strategy in use.
    #[must_use]
    pub fn strategy(&self) -> PersistenceStrategy {
        self.strategy
    }

    /// Stores a new book and returns it ready for use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Duplicate` if a book with the key exists.
    #[instrument(skip(self, draft), fields(key = %key, strategy = %self.strategy))]
    pub async fn create(
        &self,
        key: AggregateKey,
        draft: NewBook,
    ) -> RepositoryResult<Book<PersistedBook>> {
        let record = BookRecord::from(draft);
        let values = record.to_fields()?;
        let version = self
            .store
            .insert(BOOK_LAYOUT.aggregate_type, &key, values.clone())
            .await?;
        info!("book created");

        let state = match self.strategy {
            PersistenceStrategy::FullLoadSave | PersistenceStrategy::LazyTracking => {
                PersistedBook::Tracked(TrackedBookState::from_record(LazyRecord::from_inserted(
                    Arc::clone(&self.store),
                    &BOOK_LAYOUT,
                    key,
                    version,
                    values,
                    self.save_policy(),
                )))
            }
            PersistenceStrategy::Mapped => PersistedBook::Mapped(MappedBookState::new(
                Arc::clone(&self.store),
                key,
                version,
                record,
            )),
            PersistenceStrategy::SnapshotDiff => PersistedBook::Snapshot(SnapshotBookState::new(
                Arc::clone(&self.store),
                key,
                version,
                record,
            )?),
            PersistenceStrategy::DirectAccess => {
                PersistedBook::Direct(DirectBookState::new(Arc::clone(&self.store), key))
            }
        };
        Ok(Book::from_state(state))
    }

    /// Deletes a book.
    ///
    /// Returns `Ok(true)` if it was deleted, `Ok(false)` if it didn't exist.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &AggregateKey) -> RepositoryResult<bool> {
        let deleted = self.store.delete(BOOK_LAYOUT.aggregate_type, key).await?;
        debug!(deleted, "book delete");
        Ok(deleted)
    }

    /// Counts stored books.
    pub async fn count(&self) -> RepositoryResult<u64> {
        self.store.count(BOOK_LAYOUT.aggregate_type).await
    }

    fn load_policy(&self) -> LoadPolicy {
        match self.strategy {
            PersistenceStrategy::FullLoadSave => LoadPolicy::Eager,
            _ => LoadPolicy::Lazy,
        }
    }

    fn save_policy(&self) -> SavePolicy {
        match self.strategy {
            PersistenceStrategy::FullLoadSave => SavePolicy::AllFields,
            _ => SavePolicy::DirtyOnly,
        }
    }
}

#[async_trait]
impl AggregateRepository for BookRepository {
    type Aggregate = Book<PersistedBook>;

    #[instrument(skip(self), fields(key = %key, strategy = %self.strategy))]
    async fn load(&self, key: &AggregateKey) -> RepositoryResult<Self::Aggregate> {
        let store = Arc::clone(&self.store);
        let key = key.clone();
        let state = match self.strategy {
            PersistenceStrategy::FullLoadSave | PersistenceStrategy::LazyTracking => {
                PersistedBook::Tracked(
                    TrackedBookState::load(store, key, self.load_policy(), self.save_policy())
                        .await?,
                )
            }
            PersistenceStrategy::Mapped => {
                PersistedBook::Mapped(MappedBookState::load(store, key).await?)
            }
            PersistenceStrategy::SnapshotDiff => {
                PersistedBook::Snapshot(SnapshotBookState::load(store, key).await?)
            }
            PersistenceStrategy::DirectAccess => {
                PersistedBook::Direct(DirectBookState::load(store, key).await?)
            }
        };
        debug!("book loaded");
        Ok(Book::from_state(state))
    }

    #[instrument(skip(self, aggregate), fields(key = %aggregate.key(), strategy = %self.strategy))]
    async fn save(&self, aggregate: &mut Self::Aggregate) -> RepositoryResult<SaveOutcome> {
        match aggregate.state_mut().save().await {
            Ok(SaveOutcome::Unchanged) => {
                debug!("book unchanged, nothing written");
                Ok(SaveOutcome::Unchanged)
            }
            Ok(SaveOutcome::Written { fields, version }) => {
                info!(?fields, %version, "book saved");
                Ok(SaveOutcome::Written { fields, version })
            }
            Err(err) => {
                if err.is_version_conflict() {
                    warn!(error = %err, "concurrent modification detected");
                }
                Err(err)
            }
        }
    }
}
