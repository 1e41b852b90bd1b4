//! # Infrastructure Layer
//!
//! Everything that touches storage. The domain layer never imports from
//! here.

pub mod persistence;
