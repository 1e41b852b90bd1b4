//! # Identity Value Objects
//!
//! [`AggregateKey`] identifies one aggregate instance; [`Version`] is the
//! record version used for optimistic concurrency.

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identity of an aggregate.
///
/// Used both as the external lookup key and as the target key of partial
/// updates in the backing store.
///
/// # Invariants
///
/// - Never empty or whitespace-only
///
/// # Examples
///
/// ```
/// use aggregate_repository::domain::value_objects::AggregateKey;
///
/// let key = AggregateKey::parse("B1").unwrap();
/// assert_eq!(key.as_str(), "B1");
/// assert!(AggregateKey::parse("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateKey(String);

impl AggregateKey {
    /// Parses a key, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidKey` if the key is empty or whitespace.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_key("key must not be blank"));
        }
        Ok(Self(value))
    }

    /// Generates a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AggregateKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Version of a stored record.
///
/// Starts at [`Version::INITIAL`] on insert and increases by one with every
/// successful write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version assigned to freshly inserted records.
    pub const INITIAL: Self = Self(1);

    /// Creates a version from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the version following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
