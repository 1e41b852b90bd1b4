//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! - [`AggregateKey`]: string-based aggregate identity
//! - [`Version`]: record version for optimistic concurrency
//! - [`Timestamp`]: UTC point in time

pub mod ids;
pub mod timestamp;

pub use ids::{AggregateKey, Version};
pub use timestamp::Timestamp;
