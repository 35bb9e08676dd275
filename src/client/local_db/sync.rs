//! # Pending Mutation Storage
//!
//! Rows of the `pending_mutations` table. The `seq` column is both the stable
//! handle of an entry and its replay order, so rewriting an entry in place
//! never moves it in the queue.

use crate::client::local_db::{LocalDatabase, Result};
use crate::shared::mutation::QueuedMutation;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Key prefix under which unreadable queue rows are set aside, followed by
/// their `seq`
pub const UNREADABLE_MUTATION_PREFIX: &str = "unreadable_mutation_";

/// A persisted queue entry
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Stable position in the queue
    pub seq: i64,
    pub mutation: QueuedMutation,
    pub queued_at: DateTime<Utc>,
    /// Failed replay attempts so far
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

fn encode(mutation: &QueuedMutation) -> Result<String> {
    serde_json::to_string(mutation).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn decode(row: &SqliteRow) -> Result<QueueEntry> {
    let payload: String = row.try_get("payload")?;
    let mutation =
        serde_json::from_str(&payload).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(QueueEntry {
        seq: row.try_get("seq")?,
        mutation,
        queued_at: row.try_get("queued_at")?,
        attempts: row.try_get("attempts")?,
        last_attempt: row.try_get("last_attempt")?,
        last_error: row.try_get("last_error")?,
    })
}

impl LocalDatabase {
    /// Append a mutation, returning its sequence number
    pub async fn insert_mutation(&self, mutation: &QueuedMutation) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO pending_mutations (payload, queued_at, attempts) VALUES (?, ?, 0)",
        )
        .bind(encode(mutation)?)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All entries in replay order
    ///
    /// Rows whose payload no longer parses are moved out of the queue to
    /// `unreadable_mutation_<seq>` in the key/value store.
    pub async fn load_mutations(&self) -> Result<Vec<QueueEntry>> {
        let rows = sqlx::query(
            "SELECT seq, payload, queued_at, attempts, last_attempt, last_error
             FROM pending_mutations
             ORDER BY seq ASC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match decode(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    let seq: i64 = row.try_get("seq")?;
                    let payload: String = row.try_get("payload").unwrap_or_default();
                    tracing::warn!("Setting aside unreadable queued mutation {}: {}", seq, e);
                    self.set_item(&format!("{}{}", UNREADABLE_MUTATION_PREFIX, seq), &payload)
                        .await?;
                    self.delete_mutation(seq).await?;
                }
            }
        }

        Ok(entries)
    }

    /// Remove one entry; returns whether it existed
    pub async fn delete_mutation(&self, seq: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_mutations WHERE seq = ?")
            .bind(seq)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite an entry's mutation and bookkeeping, keeping its position
    pub async fn update_mutation(&self, entry: &QueueEntry) -> Result<()> {
        sqlx::query(
            "UPDATE pending_mutations SET
                payload = ?,
                attempts = ?,
                last_attempt = ?,
                last_error = ?
             WHERE seq = ?",
        )
        .bind(encode(&entry.mutation)?)
        .bind(entry.attempts)
        .bind(entry.last_attempt)
        .bind(&entry.last_error)
        .bind(entry.seq)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Bump the attempt counter and remember why the replay failed
    pub async fn record_mutation_failure(&self, seq: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pending_mutations SET
                attempts = attempts + 1,
                last_attempt = ?,
                last_error = ?
             WHERE seq = ?",
        )
        .bind(Utc::now())
        .bind(error_message)
        .bind(seq)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Swap the whole table content in one transaction
    pub async fn replace_mutations(&self, entries: &[QueueEntry]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM pending_mutations")
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO pending_mutations
                    (seq, payload, queued_at, attempts, last_attempt, last_error)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(entry.seq)
            .bind(encode(&entry.mutation)?)
            .bind(entry.queued_at)
            .bind(entry.attempts)
            .bind(entry.last_attempt)
            .bind(&entry.last_error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Drop every pending mutation
    pub async fn clear_mutations(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pending_mutations")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_mutations(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_mutations")
            .fetch_one(self.pool())
            .await?;
        Ok(count as usize)
    }
}
