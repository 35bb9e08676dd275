//! # Collection Cache
//!
//! Last-known-good copies of server collections, stored as JSON arrays in the
//! key/value table under `teams_<userId>`, `projects_<teamId>`,
//! `teamMembers_<teamId>` and `tasks_<projectId>`.
//!
//! Reads never fail: a missing key, an unreadable row or malformed JSON all
//! come back as `None` (the latter two with a warning).

use crate::client::error::Result;
use crate::client::local_db::LocalDatabase;
use crate::shared::error::SharedError;
use crate::shared::ids::{EntityId, PlaceholderId};
use crate::shared::mutation::{MutationKind, QueuedMutation};
use crate::shared::record::Record;
use std::fmt;

/// Address of one cached collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Teams the user belongs to
    Teams(String),
    /// Projects of a team
    Projects(EntityId),
    /// Members of a team
    TeamMembers(EntityId),
    /// Tasks of a project
    Tasks(EntityId),
}

impl CacheKey {
    /// Collection a created entity is listed in
    pub fn owner_of(mutation: &QueuedMutation, user_id: Option<&str>) -> Option<CacheKey> {
        match mutation.kind {
            MutationKind::CreateTeam => user_id.map(|uid| CacheKey::Teams(uid.to_string())),
            MutationKind::CreateProject => mutation.body.team_id.clone().map(CacheKey::Projects),
            MutationKind::CreateTask => mutation.body.project_id.clone().map(CacheKey::Tasks),
            MutationKind::Generic => None,
        }
    }

    /// Collections keyed by an entity of `kind` with id `id`
    pub fn children_of(kind: MutationKind, id: &EntityId) -> Vec<CacheKey> {
        match kind {
            MutationKind::CreateTeam => vec![
                CacheKey::Projects(id.clone()),
                CacheKey::TeamMembers(id.clone()),
            ],
            MutationKind::CreateProject => vec![CacheKey::Tasks(id.clone())],
            MutationKind::CreateTask | MutationKind::Generic => Vec::new(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Teams(user_id) => write!(f, "teams_{}", user_id),
            CacheKey::Projects(team_id) => write!(f, "projects_{}", team_id),
            CacheKey::TeamMembers(team_id) => write!(f, "teamMembers_{}", team_id),
            CacheKey::Tasks(project_id) => write!(f, "tasks_{}", project_id),
        }
    }
}

/// Key/value backed store of cached collections
#[derive(Debug, Clone)]
pub struct CacheStore {
    db: LocalDatabase,
}

impl CacheStore {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }

    /// Most recent snapshot for `key`
    pub async fn read(&self, key: &CacheKey) -> Option<Vec<Record>> {
        let name = key.to_string();
        let raw = match self.db.get_item(&name).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read cached {}: {}", name, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                tracing::warn!("Ignoring malformed cache entry {}: {}", name, e);
                None
            }
        }
    }

    /// Replace the snapshot for `key`
    pub async fn write(&self, key: &CacheKey, records: &[Record]) -> Result<()> {
        let raw = serde_json::to_string(records).map_err(SharedError::from)?;
        self.db.set_item(&key.to_string(), &raw).await?;
        Ok(())
    }

    /// Add one record to the end of a collection, creating it if needed.
    ///
    /// A stored value that does not parse is copied to `<key>_unreadable`
    /// before the collection starts over.
    pub async fn append(&self, key: &CacheKey, record: Record) -> Result<()> {
        let name = key.to_string();
        let mut records = match self.db.get_item(&name).await? {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<Record>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    let backup = format!("{}_unreadable", name);
                    tracing::warn!(
                        "Replacing unreadable cached {} (old value kept as {}): {}",
                        name,
                        backup,
                        e
                    );
                    self.db.set_item(&backup, &raw).await?;
                    Vec::new()
                }
            },
        };
        records.push(record);
        self.write(key, &records).await
    }

    /// Confirm `old` as `new` in every record of one collection.
    ///
    /// Only records that mention `old` change; returns how many did.
    pub async fn rewrite_id(&self, key: &CacheKey, old: &PlaceholderId, new: u64) -> Result<usize> {
        let Some(mut records) = self.read(key).await else {
            return Ok(0);
        };

        let mut changed = 0;
        for record in records.iter_mut() {
            if record.rewrite(old, new) {
                changed += 1;
            }
        }

        if changed > 0 {
            self.write(key, &records).await?;
            tracing::debug!("Rewrote {} -> {} in {} cached {} entries", old, new, changed, key);
        }
        Ok(changed)
    }

    /// Move a collection to a new key, appending to anything already there
    pub async fn rekey(&self, from: &CacheKey, to: &CacheKey) -> Result<bool> {
        let Some(moved) = self.read(from).await else {
            return Ok(false);
        };

        let mut records = self.read(to).await.unwrap_or_default();
        records.extend(moved);
        self.write(to, &records).await?;
        self.db.remove_item(&from.to_string()).await?;
        tracing::debug!("Moved cached {} to {}", from, to);
        Ok(true)
    }
}
