//! # Mutation Queue
//!
//! Durable FIFO of writes made while offline. Entries survive app restarts
//! and are only removed once the server confirms them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasksync::client::local_db::LocalDatabase;
//! use tasksync::client::offline::MutationQueue;
//! use tasksync::shared::{QueuedMutation, Record};
//!
//! # async fn example() -> tasksync::client::Result<()> {
//! let queue = MutationQueue::new(LocalDatabase::in_memory().await?);
//! let seq = queue
//!     .enqueue(QueuedMutation::create_team(Record::new().with_field("name", "Ops")))
//!     .await?;
//!
//! for entry in queue.snapshot().await? {
//!     // replay entry.mutation...
//!     queue.remove(entry.seq).await?;
//! }
//! # let _ = seq;
//! # Ok(())
//! # }
//! ```

use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use crate::shared::mutation::QueuedMutation;

pub use crate::client::local_db::QueueEntry;

/// Persistent queue of pending mutations
///
/// Each instance owns a database handle, so independent queues can coexist
/// in one process (one per test, one per signed-in account).
#[derive(Debug, Clone)]
pub struct MutationQueue {
    db: LocalDatabase,
}

impl MutationQueue {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }

    /// Append a mutation at the tail
    pub async fn enqueue(&self, mutation: QueuedMutation) -> Result<i64> {
        let seq = self.db.insert_mutation(&mutation).await?;
        tracing::debug!(
            "Queued {} {} as #{} ({:?})",
            mutation.method,
            mutation.url,
            seq,
            mutation.kind
        );
        Ok(seq)
    }

    /// Copy of the queue in replay order
    pub async fn snapshot(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.db.load_mutations().await?)
    }

    /// Atomically replace the whole queue content
    pub async fn replace_all(&self, entries: Vec<QueueEntry>) -> Result<()> {
        self.db.replace_mutations(&entries).await?;
        Ok(())
    }

    /// Drop every entry
    pub async fn clear(&self) -> Result<()> {
        let removed = self.db.clear_mutations().await?;
        tracing::info!("Cleared {} queued mutations", removed);
        Ok(())
    }

    /// Acknowledge one entry
    pub async fn remove(&self, seq: i64) -> Result<bool> {
        Ok(self.db.delete_mutation(seq).await?)
    }

    /// Persist a rewritten entry without moving it
    pub async fn update(&self, entry: &QueueEntry) -> Result<()> {
        self.db.update_mutation(entry).await?;
        Ok(())
    }

    /// Keep a failed entry for the next pass
    pub async fn record_failure(&self, seq: i64, error: &str) -> Result<()> {
        self.db.record_mutation_failure(seq, error).await?;
        Ok(())
    }

    /// Entries a pass would see; unreadable rows are set aside first
    pub async fn len(&self) -> Result<usize> {
        Ok(self.snapshot().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Counts for status displays
    pub async fn stats(&self) -> Result<QueueStats> {
        let entries = self.snapshot().await?;
        let failed = entries.iter().filter(|entry| entry.attempts > 0).count();
        Ok(QueueStats {
            total_operations: entries.len(),
            pending: entries.len() - failed,
            failed,
        })
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total entries in the queue
    pub total_operations: usize,
    /// Entries never attempted
    pub pending: usize,
    /// Entries that failed at least once and are waiting for a retry
    pub failed: usize,
}
