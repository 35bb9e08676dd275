//! # Offline Support
//!
//! Offline-first writes for teams, projects and tasks: optimistic cache
//! updates, a durable mutation queue and placeholder reconciliation once the
//! server has confirmed what was created offline.
//!
//! ## Key Components
//!
//! - `cache.rs`: last-known-good collections in the key/value table
//! - `queue.rs`: persistent FIFO of pending mutations
//! - `reconciliation.rs`: placeholder to server id rewriting
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn demo() -> tasksync::client::Result<()> {
//! use std::sync::Arc;
//! use tasksync::client::{Config, OfflineManager, TracingTelemetry};
//! use tasksync::shared::Record;
//! use tokio::sync::watch;
//!
//! let (_online_tx, online_rx) = watch::channel(false);
//! let manager = OfflineManager::new(Config::from_env()?, online_rx, Arc::new(TracingTelemetry)).await?;
//!
//! // Offline: gets a placeholder id, shows up in the cache, waits in the queue
//! let submission = manager.create_team(Record::new().with_field("name", "Ops")).await?;
//! println!("{:?}", submission);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod queue;
pub mod reconciliation;

pub use cache::{CacheKey, CacheStore};
pub use queue::{MutationQueue, QueueEntry, QueueStats};
pub use reconciliation::{ReconciliationResult, Reconciler};

use crate::client::api::ApiClient;
use crate::client::config::Config;
use crate::client::error::Result;
use crate::client::local_db::{LocalDatabase, AUTH_TOKEN_KEY, USER_ID_KEY};
use crate::client::sync::{start_listener, ListenerHandle, SyncPromptRequest, SyncReport, Synchronizer};
use crate::client::telemetry::Telemetry;
use crate::shared::ids::{EntityId, PlaceholderId};
use crate::shared::mutation::QueuedMutation;
use crate::shared::record::Record;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// What happened to a submitted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Accepted by the server right away
    Delivered { id: Option<u64> },
    /// Stored for replay; `placeholder` stands in for the id until then
    Queued {
        seq: i64,
        placeholder: Option<PlaceholderId>,
    },
}

/// Entry point for screens: writes, reads and the sync listener
#[derive(Debug)]
pub struct OfflineManager {
    config: Config,
    db: LocalDatabase,
    synchronizer: Arc<Synchronizer>,
    connectivity: watch::Receiver<bool>,
}

impl OfflineManager {
    /// Open the database at the configured path
    pub async fn new(
        config: Config,
        connectivity: watch::Receiver<bool>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        let db = LocalDatabase::open(&config.database_path()).await?;
        Self::with_database(config, db, connectivity, telemetry)
    }

    pub fn with_database(
        config: Config,
        db: LocalDatabase,
        connectivity: watch::Receiver<bool>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        let api = ApiClient::new(config.clone())?;
        let synchronizer = Arc::new(Synchronizer::new(api, db.clone(), telemetry));
        Ok(Self {
            config,
            db,
            synchronizer,
            connectivity,
        })
    }

    pub fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.db
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    pub fn queue(&self) -> &MutationQueue {
        self.synchronizer.queue()
    }

    pub fn cache(&self) -> &CacheStore {
        self.synchronizer.cache()
    }

    /// Store the credentials used for replays and the `teams_<userId>` key
    pub async fn remember_session(&self, token: &str, user_id: &str) -> Result<()> {
        self.db.set_item(AUTH_TOKEN_KEY, token).await?;
        self.db.set_item(USER_ID_KEY, user_id).await?;
        Ok(())
    }

    /// Queue a mutation for the next sync pass, as is
    pub async fn enqueue(&self, mutation: QueuedMutation) -> Result<i64> {
        self.queue().enqueue(mutation).await
    }

    /// Run one sync pass now
    pub async fn process_queue(&self) -> Result<SyncReport> {
        self.synchronizer.process_queue().await
    }

    /// Start the connectivity listener.
    ///
    /// With `auto_confirm_sync` configured, `prompts` is ignored and nobody is
    /// asked.
    pub fn start_listener(&self, prompts: Option<mpsc::Sender<SyncPromptRequest>>) -> ListenerHandle {
        let prompts = if self.config.auto_confirm_sync() { None } else { prompts };
        start_listener(Arc::clone(&self.synchronizer), self.connectivity.clone(), prompts)
    }

    /// Send a mutation now if online, otherwise queue it.
    ///
    /// A create queued offline gets a placeholder id if it has none and is
    /// appended to its collection in the cache. A transport failure while
    /// online takes the offline path; a rejection by the server does not.
    ///
    /// Anything that carries a placeholder is queued even when online, so
    /// it goes out behind its creator with the confirmed id in place.
    pub async fn submit(&self, mutation: QueuedMutation) -> Result<Submission> {
        let unconfirmed = mutation.creates().is_some() || !mutation.depends_on().is_empty();
        if unconfirmed {
            tracing::debug!("{} refers to an unconfirmed entity, queueing it", mutation.url);
        } else if self.is_online() {
            match self.deliver(&mutation).await {
                Ok(submission) => return Ok(submission),
                Err(e) if e.is_network() => {
                    tracing::warn!("Sending {} failed, queueing it instead: {}", mutation.url, e);
                }
                Err(e) => return Err(e),
            }
        }
        self.store_offline(mutation).await
    }

    pub async fn create_team(&self, body: Record) -> Result<Submission> {
        self.submit(QueuedMutation::create_team(body)).await
    }

    pub async fn create_project(&self, team_id: impl Into<EntityId>, body: Record) -> Result<Submission> {
        self.submit(QueuedMutation::create_project(body.with_team(team_id))).await
    }

    pub async fn create_task(&self, project_id: impl Into<EntityId>, body: Record) -> Result<Submission> {
        self.submit(QueuedMutation::create_task(body.with_project(project_id))).await
    }

    /// Read a collection: fresh from the server when possible, cached otherwise.
    ///
    /// Entries created offline and not yet confirmed are kept on refresh.
    pub async fn fetch_collection(&self, key: &CacheKey, path: &str) -> Result<Vec<Record>> {
        if self.is_online() {
            let token = self.db.auth_token().await?;
            match self.synchronizer.api().fetch_records(path, token.as_deref()).await {
                Ok(mut records) => {
                    let unconfirmed = self
                        .cache()
                        .read(key)
                        .await
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|record| record.id.as_ref().is_some_and(EntityId::is_pending));
                    records.extend(unconfirmed);
                    self.cache().write(key, &records).await?;
                    return Ok(records);
                }
                Err(e) => {
                    tracing::warn!("Fetching {} failed, using cached {}: {}", path, key, e);
                }
            }
        }
        Ok(self.cache().read(key).await.unwrap_or_default())
    }

    async fn deliver(&self, mutation: &QueuedMutation) -> Result<Submission> {
        let token = self.db.auth_token().await?;
        let response = self.synchronizer.api().send(mutation, token.as_deref()).await?;
        let id = response.server_id(mutation.kind);

        if let Some(event) = mutation.kind.created_event() {
            self.synchronizer
                .telemetry()
                .track(event, &json!({ "id": id, "offline": false }));
        }

        if mutation.kind.is_create() {
            let user_id = self.db.user_id().await?;
            if let Some(owner) = CacheKey::owner_of(mutation, user_id.as_deref()) {
                let mut record = mutation.body.clone();
                if let Some(id) = id {
                    record.id = Some(EntityId::Confirmed(id));
                }
                self.cache().append(&owner, record).await?;
            }
        }

        Ok(Submission::Delivered { id })
    }

    async fn store_offline(&self, mut mutation: QueuedMutation) -> Result<Submission> {
        if mutation.kind.is_create() && mutation.body.id.is_none() {
            mutation.body.id = Some(EntityId::pending());
        }
        let placeholder = mutation.creates().cloned();

        if mutation.kind.is_create() {
            let user_id = self.db.user_id().await?;
            match CacheKey::owner_of(&mutation, user_id.as_deref()) {
                Some(owner) => self.cache().append(&owner, mutation.body.clone()).await?,
                None => tracing::debug!("No cached collection for offline {}", mutation.url),
            }
        }

        let seq = self.enqueue(mutation).await?;
        Ok(Submission::Queued { seq, placeholder })
    }
}
