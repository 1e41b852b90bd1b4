//! # Aggregate Repository
//!
//! Repository pattern for aggregates whose fields are expensive to load.
//!
//! An aggregate such as [`Book`](domain::entities::Book) is a facade over an
//! accessor port. The persistence layer supplies the port with one of five
//! [`PersistenceStrategy`](infrastructure::persistence::PersistenceStrategy)
//! implementations, the default being lazy loading with per-field dirty
//! tracking: deferred fields are fetched on first access and `save` writes
//! only the fields that changed.
//!
//! ## Layers
//!
//! - [`domain`]: aggregates, value objects, business errors
//! - [`infrastructure`]: repository ports, lazy record engine, stores
//! - [`config`]: layered configuration
//! - [`telemetry`]: tracing subscriber setup
//!
//! # Examples
//!
//! ```no_run
//! use aggregate_repository::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), RepositoryError> {
//! let store = Arc::new(InMemoryStore::new());
//! let repo = BookRepository::new(store, PersistenceStrategy::LazyTracking);
//!
//! let key = AggregateKey::parse("B1")?;
//! repo.create(key.clone(), NewBook::new("Go", "Pike", "chapter text")?).await?;
//!
//! let mut book = repo.load(&key).await?;
//! book.record_reading(Timestamp::now()).await?;
//! repo.save(&mut book).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod telemetry;

/// Commonly used types.
pub mod prelude {
    pub use crate::config::RepositoryConfig;
    pub use crate::domain::entities::{Book, BookState, NewBook};
    pub use crate::domain::errors::DomainError;
    pub use crate::domain::value_objects::{AggregateKey, Timestamp, Version};
    pub use crate::infrastructure::persistence::{
        AggregateRepository, BackingStore, BookRepository, InMemoryStore, PersistedBook,
        PersistenceStrategy, RepositoryError, RepositoryResult, SaveOutcome, UnitOfWork,
    };
}
