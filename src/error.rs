//! Error types for the coordinator

use thiserror::Error;

/// Main error type for coordinator operations
///
/// Variants map one-to-one onto the error kinds callers can observe:
/// authorization failures, argument validation, lookup misses, duplicate
/// creation, upstream (shard/consensus/catalog) failures, and panics that
/// were contained by the crash shield.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The requesting user lacks permission for the operation
    #[error("{0}")]
    Authorization(String),

    /// An argument failed validation, or a shard reported a query error
    #[error("{0}")]
    InvalidArgument(String),

    /// A function-style clause received the wrong number of arguments
    #[error("{0}")]
    WrongNumberOfArguments(String),

    /// The named object does not exist
    #[error("{0}")]
    NotFound(String),

    /// The named object already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// A shard, consensus, or catalog call returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// An unexpected failure was caught by the crash shield
    ///
    /// Diagnostics are logged; the caller only ever sees this generic
    /// message.
    #[error("Internal Error")]
    Internal,
}

impl CoordinatorError {
    /// Build an [`CoordinatorError::Authorization`] from a message
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// Build an [`CoordinatorError::InvalidArgument`] from a message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Build a [`CoordinatorError::NotFound`] from a message
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Build an [`CoordinatorError::AlreadyExists`] from a message
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists(message.into())
    }

    /// Build an [`CoordinatorError::Upstream`] from a message
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoordinatorError>;
