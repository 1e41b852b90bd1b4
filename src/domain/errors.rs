//! # Domain Errors
//!
//! Error types raised by business rules inside aggregates and value objects.
//!
//! These errors never originate from persistence. Accessor ports convert them
//! into their own error type so that facade operations surface a single
//! error to the caller.

use thiserror::Error;

/// Error raised when a business rule rejects an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// An identity key was malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl DomainError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates an invalid key error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
