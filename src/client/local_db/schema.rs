//! # Local Schema
//!
//! Versioned DDL for the client database. Each migration is applied once, in
//! order, and recorded in `schema_migrations`.

/// Bookkeeping table, created before any migration runs
pub const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// Ordered `(version, statements)` pairs
pub const MIGRATIONS: &[(i64, &[&str])] = &[(
    1,
    &[
        // getItem/setItem store: cached collections, auth token, user id
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        // seq is the stable arena index and the replay order
        "CREATE TABLE IF NOT EXISTS pending_mutations (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            queued_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt TEXT,
            last_error TEXT
        )",
    ],
)];

/// Highest version in [`MIGRATIONS`]
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
}
