//! # In-Memory Persistence
//!
//! In-memory [`BackingStore`](crate::infrastructure::persistence::BackingStore)
//! for testing without database dependencies.
//!
//! ## Thread Safety
//!
//! Records live in an `Arc<RwLock<HashMap>>`; the operation log in an
//! `Arc<Mutex<_>>`.

pub mod store;

pub use store::{FetchEntry, InMemoryStore, StoreLog, WriteEntry};
