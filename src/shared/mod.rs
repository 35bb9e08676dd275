//! Shared Module
//!
//! Types shared by screens, the local database and the remote API: entity
//! ids, records, queued mutations, configuration and errors.
//!
//! # Overview
//!
//! Nothing in here touches the network or disk. The client module builds on
//! these types to queue, persist and replay mutations.

/// Placeholder and confirmed entity ids
pub mod ids;

/// JSON records with typed references
pub mod record;

/// Deferred write operations
pub mod mutation;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError, FileConfig};
pub use error::SharedError;
pub use ids::{EntityId, PlaceholderId, PLACEHOLDER_PREFIX};
pub use mutation::{HttpMethod, MutationKind, QueuedMutation};
pub use record::Record;
