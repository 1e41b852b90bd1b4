//! # Domain Layer
//!
//! Aggregates, value objects and business errors. Nothing in this module
//! depends on persistence.

pub mod entities;
pub mod errors;
pub mod value_objects;
