//! Shared Error Types
//!
//! Errors raised while building or decoding the data shared between screens,
//! the local store and the remote API: placeholder ids, entity ids and
//! mutation payloads.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - A value violates a data-model rule
//! - `InvalidPlaceholder` - A string is not a `local-` placeholder id
//!
//! # Usage
//!
//! ```rust
//! use tasksync::shared::error::SharedError;
//!
//! let error = SharedError::validation("method", "unsupported HTTP method: PATCH");
//! ```
use thiserror::Error;

/// Shared error types for the offline data model
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// A string that should have been a placeholder id
    #[error("Invalid placeholder id: '{value}'")]
    InvalidPlaceholder {
        /// The offending value
        value: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid placeholder error
    pub fn invalid_placeholder(value: impl Into<String>) -> Self {
        Self::InvalidPlaceholder {
            value: value.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
