//! # Placeholder Reconciliation
//!
//! Once the server assigns a real id to an entity created offline, every
//! reference to its placeholder must go: in the queue entries still waiting
//! to be replayed, in the collection that lists the entity, and in the cache
//! keys of its child collections (`projects_<placeholder>` and friends).

use crate::client::error::Result;
use crate::client::local_db::QueueEntry;
use crate::client::offline::cache::{CacheKey, CacheStore};
use crate::client::offline::queue::MutationQueue;
use crate::shared::ids::{EntityId, PlaceholderId};
use crate::shared::mutation::QueuedMutation;

/// What one confirmation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Queue entries whose body referenced the placeholder
    pub queue_entries_rewritten: usize,
    /// Cached records rewritten across all touched collections
    pub cache_entries_rewritten: usize,
    /// Child collections moved off a placeholder key
    pub collections_rekeyed: usize,
}

/// Applies a placeholder → server id confirmation to the queue and the cache
#[derive(Debug, Clone)]
pub struct Reconciler {
    queue: MutationQueue,
    cache: CacheStore,
}

impl Reconciler {
    pub fn new(queue: MutationQueue, cache: CacheStore) -> Self {
        Self { queue, cache }
    }

    /// Rewrite `placeholder` to `real` everywhere.
    ///
    /// `remaining` are the entries not yet replayed in the current pass; they
    /// are updated in memory and persisted in place.
    pub async fn confirm(
        &self,
        created: &QueuedMutation,
        placeholder: &PlaceholderId,
        real: u64,
        remaining: &mut [QueueEntry],
        user_id: Option<&str>,
    ) -> Result<ReconciliationResult> {
        let mut result = ReconciliationResult {
            queue_entries_rewritten: self.rewrite_queue(placeholder, real, remaining).await?,
            ..Default::default()
        };

        match CacheKey::owner_of(created, user_id) {
            Some(owner) => {
                result.cache_entries_rewritten +=
                    self.cache.rewrite_id(&owner, placeholder, real).await?;
            }
            None => tracing::debug!(
                "No owning collection for {:?} {}; cache left as is",
                created.kind,
                placeholder
            ),
        }

        let pending = EntityId::Pending(placeholder.clone());
        let confirmed = EntityId::Confirmed(real);
        for (from, to) in CacheKey::children_of(created.kind, &pending)
            .into_iter()
            .zip(CacheKey::children_of(created.kind, &confirmed))
        {
            if self.cache.rekey(&from, &to).await? {
                result.collections_rekeyed += 1;
            }
            result.cache_entries_rewritten += self.cache.rewrite_id(&to, placeholder, real).await?;
        }

        tracing::info!(
            "Confirmed {} as {}: {} queued, {} cached, {} collections moved",
            placeholder,
            real,
            result.queue_entries_rewritten,
            result.cache_entries_rewritten,
            result.collections_rekeyed
        );
        Ok(result)
    }

    async fn rewrite_queue(
        &self,
        placeholder: &PlaceholderId,
        real: u64,
        remaining: &mut [QueueEntry],
    ) -> Result<usize> {
        let mut rewritten = 0;
        for entry in remaining.iter_mut() {
            if entry.mutation.body.rewrite(placeholder, real) {
                self.queue.update(entry).await?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }
}
