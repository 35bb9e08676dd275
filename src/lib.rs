//! tasksync - Offline Core Library
//!
//! tasksync is the offline engine of a team/project/task collaboration
//! client. Writes made without connectivity are recorded durably, replayed in
//! order once the device is back online, and every placeholder id minted
//! offline is replaced by the id the server assigned, in the remaining queue
//! and in the local cache alike.
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types
//!   - Entity ids (placeholder or confirmed), records, queued mutations
//!   - Configuration and error types
//!
//! - **`client`** - The offline engine
//!   - SQLite-backed key/value cache and mutation queue (sqlx)
//!   - reqwest API client
//!   - Connectivity monitor, synchronizer and background listener
//!   - `OfflineManager` façade for screens
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasksync::client::{Config, OfflineManager, TracingTelemetry};
//! use tasksync::shared::Record;
//! use tokio::sync::{mpsc, watch};
//!
//! # async fn example() -> tasksync::client::Result<()> {
//! let (online_tx, online_rx) = watch::channel(false);
//! let manager = OfflineManager::new(Config::from_env()?, online_rx, Arc::new(TracingTelemetry)).await?;
//!
//! let (prompt_tx, mut prompt_rx) = mpsc::channel(1);
//! let listener = manager.start_listener(Some(prompt_tx));
//!
//! manager.create_team(Record::new().with_field("name", "Ops")).await?;
//! online_tx.send_replace(true);
//!
//! if let Some(prompt) = prompt_rx.recv().await {
//!     prompt.accept();
//! }
//! listener.unsubscribe().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::SharedError` and `shared::ConfigError` for data and config
//! - `client::SyncError` for everything that touches disk or network
//! - Per-entry replay failures never abort a pass; they are listed in the
//!   `SyncReport` and the entry stays queued

/// Shared types and data structures
pub mod shared;

/// Offline queue, cache and synchronization
pub mod client;
