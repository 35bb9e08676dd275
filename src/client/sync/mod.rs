//! # Background Sync
//!
//! Replays mutations queued while offline once connectivity returns.
//!
//! ## Architecture
//!
//! - **Network Monitor**: connectivity state machine deciding when to prompt
//! - **Synchronizer**: one FIFO pass over the queue with id reconciliation
//! - **Background Listener**: connectivity-driven task tying the two together
//! - **Sync State**: what the listener publishes for a UI
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn demo() -> tasksync::client::Result<()> {
//! use std::sync::Arc;
//! use tasksync::client::{ApiClient, Config, LocalDatabase, TracingTelemetry};
//! use tasksync::client::sync::Synchronizer;
//!
//! let config = Config::from_env()?;
//! let db = LocalDatabase::open(&config.database_path()).await?;
//! let synchronizer = Synchronizer::new(ApiClient::new(config)?, db, Arc::new(TracingTelemetry));
//!
//! let report = synchronizer.process_queue().await?;
//! println!("{} synced, {} still queued", report.succeeded.len(), report.retained());
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod network_monitor;
pub mod sync_state;
pub mod synchronizer;

pub use background::{start_listener, ListenerHandle, SyncPromptRequest};
pub use network_monitor::{ConnectivityMonitor, ConnectivityState, MonitorAction};
pub use sync_state::SyncState;
pub use synchronizer::{FailedItem, SyncReport, Synchronizer};
