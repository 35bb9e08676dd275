//! # Queue Synchronizer
//!
//! Drains the mutation queue against the API, one entry at a time in FIFO
//! order, so a create is always confirmed before anything that depends on it
//! is sent.
//!
//! Per entry:
//! - blocked: it still points at a placeholder when its turn comes; not
//!   sent, kept. Confirmed creators have already been rewritten out of the
//!   remaining entries, so whatever is left belongs to a create that failed,
//!   was blocked, came back without an id (in this pass or an earlier one)
//!   or is no longer queued at all
//! - failed: transport error or non-2xx; kept with its attempt count bumped
//! - succeeded: removed; a returned id is propagated through the rest of the
//!   queue and the cache
//!
//! Nothing per entry aborts the pass. Only local database errors do.

use crate::client::api::ApiClient;
use crate::client::error::{Result, SyncError};
use crate::client::local_db::{LocalDatabase, QueueEntry};
use crate::client::offline::cache::CacheStore;
use crate::client::offline::queue::MutationQueue;
use crate::client::offline::reconciliation::Reconciler;
use crate::client::telemetry::Telemetry;
use crate::shared::error::SharedError;
use crate::shared::ids::PlaceholderId;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An entry that was sent and rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub seq: i64,
    pub error: String,
}

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Requests actually sent
    pub attempted: usize,
    /// Acknowledged and removed from the queue
    pub succeeded: Vec<i64>,
    /// Sent, rejected, still queued
    pub failed: Vec<FailedItem>,
    /// Not sent because a dependency is unconfirmed, still queued
    pub blocked: Vec<i64>,
    /// Placeholders replaced by server ids
    pub confirmed: Vec<(PlaceholderId, u64)>,
    /// Creates the server accepted without returning an id
    pub unresolved: Vec<PlaceholderId>,
}

impl SyncReport {
    /// Every queued entry went through and every placeholder got an id
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty() && self.unresolved.is_empty()
    }

    /// Entries left in the queue by this pass
    pub fn retained(&self) -> usize {
        self.failed.len() + self.blocked.len()
    }
}

/// Replays queued mutations and reconciles placeholder ids
pub struct Synchronizer {
    api: ApiClient,
    db: LocalDatabase,
    queue: MutationQueue,
    cache: CacheStore,
    reconciler: Reconciler,
    telemetry: Arc<dyn Telemetry>,
    pass: Mutex<()>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("api", &self.api)
            .field("queue", &self.queue)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Synchronizer {
    pub fn new(api: ApiClient, db: LocalDatabase, telemetry: Arc<dyn Telemetry>) -> Self {
        let queue = MutationQueue::new(db.clone());
        let cache = CacheStore::new(db.clone());
        Self {
            reconciler: Reconciler::new(queue.clone(), cache.clone()),
            api,
            db,
            queue,
            cache,
            telemetry,
            pass: Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    /// Whether a pass is currently running
    pub fn is_running(&self) -> bool {
        self.pass.try_lock().is_err()
    }

    /// Wait until no pass is running
    pub async fn wait_idle(&self) {
        drop(self.pass.lock().await);
    }

    /// Run one synchronization pass over the whole queue.
    ///
    /// Fails with [`SyncError::PassInProgress`] instead of overlapping a
    /// running pass. An empty queue sends nothing and touches nothing.
    pub async fn process_queue(&self) -> Result<SyncReport> {
        let _guard = self.pass.try_lock().map_err(|_| SyncError::PassInProgress)?;

        let entries = self.queue.snapshot().await?;
        if entries.is_empty() {
            tracing::debug!("Sync requested with an empty queue");
            return Ok(SyncReport::default());
        }

        tracing::info!("Starting sync pass over {} queued mutations", entries.len());
        let token = self.db.auth_token().await?;
        let user_id = self.db.user_id().await?;

        let mut remaining: VecDeque<QueueEntry> = entries.into();
        let mut report = SyncReport::default();

        while let Some(entry) = remaining.pop_front() {
            let mutation = &entry.mutation;

            if let Some(missing) = mutation.depends_on().first() {
                tracing::debug!(
                    "Holding back #{} {}: {} is not confirmed",
                    entry.seq,
                    mutation.url,
                    missing
                );
                report.blocked.push(entry.seq);
                continue;
            }

            report.attempted += 1;
            let response = match self.api.send(mutation, token.as_deref()).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(
                        "Replay of #{} {} {} failed, keeping it queued: {}",
                        entry.seq,
                        mutation.method,
                        mutation.url,
                        error
                    );
                    self.telemetry.record_error("sync.replay", &error);
                    self.queue.record_failure(entry.seq, &error.to_string()).await?;
                    report.failed.push(FailedItem {
                        seq: entry.seq,
                        error: error.to_string(),
                    });
                    continue;
                }
            };

            self.queue.remove(entry.seq).await?;
            report.succeeded.push(entry.seq);

            let server_id = response.server_id(mutation.kind);
            if let Some(event) = mutation.kind.created_event() {
                self.telemetry.track(event, &json!({ "id": server_id, "seq": entry.seq }));
            }

            let Some(placeholder) = mutation.creates() else {
                continue;
            };

            match server_id {
                Some(real) => {
                    self.reconciler
                        .confirm(
                            mutation,
                            placeholder,
                            real,
                            remaining.make_contiguous(),
                            user_id.as_deref(),
                        )
                        .await?;
                    report.confirmed.push((placeholder.clone(), real));
                }
                None => {
                    tracing::warn!(
                        "#{} {} succeeded without an id; {} stays unresolved",
                        entry.seq,
                        mutation.url,
                        placeholder
                    );
                    let field = mutation.kind.response_id_field().unwrap_or("id");
                    self.telemetry.record_error(
                        "sync.missing_id",
                        &SyncError::Shared(SharedError::validation(
                            field,
                            format!("no server id for {}", placeholder),
                        )),
                    );
                    report.unresolved.push(placeholder.clone());
                }
            }
        }

        tracing::info!(
            "Sync pass finished: {} succeeded, {} failed, {} blocked",
            report.succeeded.len(),
            report.failed.len(),
            report.blocked.len()
        );
        Ok(report)
    }
}
