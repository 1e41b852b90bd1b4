//! # Persistence Layer
//!
//! Repository ports, the lazy-loading engine, and store implementations.
//!
//! ## Ports
//!
//! - [`BackingStore`]: storage technology seam
//! - [`AggregateRepository`]: `load` / `save` surface
//!
//! ## Engine
//!
//! - [`ChangeTracker`]: per-field loaded/dirty flags
//! - [`LazyRecord`]: lazy group loading, dirty tracking, partial saves
//! - [`UnitOfWork`]: transaction-scoped identity map
//!
//! ## Implementations
//!
//! - `in_memory`: in-memory store for testing
//! - `postgres`: PostgreSQL store
//! - `book`: [`BookRepository`] and its per-strategy states

pub mod book;
pub mod in_memory;
pub mod lazy_record;
pub mod postgres;
pub mod strategy;
pub mod tracking;
pub mod traits;
pub mod unit_of_work;

pub use book::{BookRepository, PersistedBook};
pub use in_memory::InMemoryStore;
pub use lazy_record::{FieldLayout, LazyRecord, LoadPolicy, SavePolicy};
pub use postgres::PostgresStore;
pub use strategy::{LoadCost, PersistenceStrategy, SaveCost};
pub use tracking::ChangeTracker;
pub use traits::{
    AggregateRepository, BackingStore, FetchedFields, FieldValues, RepositoryError,
    RepositoryResult, SaveOutcome,
};
pub use unit_of_work::{Shared, UnitOfWork};
