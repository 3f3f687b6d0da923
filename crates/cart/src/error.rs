//! Errors published by the cart engine.
//!
//! Engine operations never return errors to their caller. Failures are caught
//! at the operation boundary, logged, and published in
//! [`CartState::error`](crate::engine::CartState::error) for the UI to render.
//! [`CartErrorKind`] lets consumers branch on the failure without matching on
//! message text.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Classification of a cart failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartErrorKind {
    /// A gateway or lookup call failed in transit or was rejected.
    NetworkFailure,
    /// The referenced product or cart does not exist.
    NotFound,
    /// Local state could not be read or written.
    InvalidState,
}

/// A cart operation failure, carrying a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Remote call failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local persistence failed or state was inconsistent.
    #[error("Invalid cart state: {0}")]
    InvalidState(String),
}

impl CartError {
    /// The error's classification.
    #[must_use]
    pub const fn kind(&self) -> CartErrorKind {
        match self {
            Self::Network(_) => CartErrorKind::NetworkFailure,
            Self::NotFound(_) => CartErrorKind::NotFound,
            Self::InvalidState(_) => CartErrorKind::InvalidState,
        }
    }
}

impl From<GatewayError> for CartError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(what) => Self::NotFound(what),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<StorageError> for CartError {
    fn from(err: StorageError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
