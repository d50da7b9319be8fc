//! Error types for the chat kernel.

use thiserror::Error;

use crate::store::StoreError;

/// Chat kernel errors.
///
/// Both variants are reported to the sending session as a generic `error`
/// event; neither is retried.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A required field was missing or empty
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The store rejected or failed the write
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl ChatError {
    /// Create a new validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
