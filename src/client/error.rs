//! Client error types
//!
//! Everything the offline engine can fail with. Per-item replay failures are
//! folded into a `SyncReport` by the synchronizer; only local database
//! failures and misuse (a second concurrent pass) escape to callers.

use crate::shared::config::ConfigError;
use crate::shared::error::SharedError;
use thiserror::Error;

/// Result alias used across the client module
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the offline queue, cache and synchronizer
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local SQLite failure
    #[error("Local database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transport failure or timeout talking to the API
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("{method} {url} rejected: {status} - {body}")]
    Rejected {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Data model violation
    #[error(transparent)]
    Shared(#[from] SharedError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `process_queue` was called while another pass was still running
    #[error("A synchronization pass is already running")]
    PassInProgress,
}

impl SyncError {
    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::Rejected { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Whether the request never got an answer from the server
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}
