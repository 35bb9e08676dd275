//! # Local Database Module
//!
//! SQLite storage for offline-first operation. One database file holds both
//! the key/value store (cached collections, auth token, user id) and the
//! durable queue of pending mutations.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: Connection pool and schema management
//! - `schema.rs`: Versioned table definitions
//! - `sync.rs`: Pending mutation rows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasksync::client::local_db::LocalDatabase;
//!
//! # async fn example() -> Result<(), sqlx::Error> {
//! let db = LocalDatabase::open(std::path::Path::new("/tmp/tasksync.db")).await?;
//! db.set_item("user_id", "7").await?;
//! assert_eq!(db.get_item("user_id").await?, Some("7".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod sync;

pub use sync::{QueueEntry, UNREADABLE_MUTATION_PREFIX};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Result as SqlxResult, Row};
use std::path::Path;
use std::str::FromStr;

/// Result type for local database operations
pub type Result<T> = SqlxResult<T>;

/// Key holding the bearer token used for replayed requests
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key holding the signed-in user's id (owner of `teams_<userId>`)
pub const USER_ID_KEY: &str = "user_id";

/// Local database connection manager
///
/// Cloning is cheap and shares the underlying pool, so the queue and the
/// cache can each hold a handle to the same database.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create a database file
    ///
    /// Creates parent directories if needed and uses WAL mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::debug!("Opened local database at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, used by tests and session-only setups
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending migrations
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(schema::MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await?;

        let current: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        for (version, statements) in schema::MIGRATIONS {
            if *version <= current {
                continue;
            }
            let mut tx = self.pool.begin().await?;
            for statement in statements.iter() {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!("Applied local schema migration {}", version);
        }

        Ok(())
    }

    /// Current schema version
    pub async fn schema_version(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
    }

    /// Read a value from the key/value store
    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Write a value to the key/value store, replacing any previous value
    pub async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a key; returns whether it existed
    pub async fn remove_item(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bearer token for API requests, if signed in
    pub async fn auth_token(&self) -> Result<Option<String>> {
        self.get_item(AUTH_TOKEN_KEY).await
    }

    /// Signed-in user's id, if known
    pub async fn user_id(&self) -> Result<Option<String>> {
        self.get_item(USER_ID_KEY).await
    }
}
