//! # PostgreSQL Persistence
//!
//! sqlx-backed [`BackingStore`](crate::infrastructure::persistence::BackingStore).

pub mod store;

pub use store::PostgresStore;
