//! Client Module
//!
//! The offline core of the mobile client: everything between a screen that
//! wants to create a team, project or task and the HTTP API that eventually
//! stores it.
//!
//! # Architecture
//!
//! - **`config`** - Server URL, timeouts, database path
//! - **`local_db`** - SQLite key/value store and durable mutation queue
//! - **`api`** - reqwest client for the collaboration backend
//! - **`offline`** - Cache, queue, reconciliation and the `OfflineManager` façade
//! - **`sync`** - Connectivity monitor, synchronizer and background listener
//! - **`telemetry`** - Analytics and error reporting sink
//! - **`main`** - `tasksync-agent` binary that drains the queue once
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Command line queue drainer
//! ├── config.rs       - Configuration management
//! ├── error.rs        - SyncError
//! ├── api.rs          - HTTP client
//! ├── telemetry.rs    - Telemetry trait and sinks
//! ├── local_db/       - SQLite persistence
//! ├── offline/        - Cache, queue, reconciliation
//! └── sync/           - Monitor, synchronizer, listener
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod local_db;
pub mod offline;
pub mod sync;
pub mod telemetry;

// Re-export commonly used types
pub use api::{ApiClient, ApiResponse};
pub use config::Config;
pub use error::{Result, SyncError};
pub use local_db::LocalDatabase;
pub use offline::{CacheKey, CacheStore, MutationQueue, OfflineManager, QueueEntry, Submission};
pub use sync::{start_listener, ListenerHandle, SyncPromptRequest, SyncReport, SyncState, Synchronizer};
pub use telemetry::{NoopTelemetry, Telemetry, TracingTelemetry};
