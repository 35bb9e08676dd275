//! Entity identifiers
//!
//! Every entity reference (`id`, `team_id`, `project_id`, `parent_task_id`)
//! is either a client placeholder minted while offline or a numeric id the
//! server assigned. Keeping the two apart in [`EntityId`] means a rewrite can
//! only ever replace a placeholder with a confirmed id.
//!
//! Placeholders follow `local-<base36 millis>-<base36 random>` and are what
//! screens must put in bodies of entities created offline.

use crate::shared::error::SharedError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved prefix that marks a client-generated id
pub const PLACEHOLDER_PREFIX: &str = "local-";

const RANDOM_SPACE: u64 = 36u64.pow(8);

/// Client-generated identifier for an entity the server has not confirmed yet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderId(String);

impl PlaceholderId {
    /// Mint a fresh placeholder from the current time and a random suffix
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let random = (uuid::Uuid::new_v4().as_u128() as u64) % RANDOM_SPACE;
        Self(format!(
            "{}{}-{}",
            PLACEHOLDER_PREFIX,
            to_base36(millis),
            to_base36(random)
        ))
    }

    /// Parse an existing placeholder, rejecting anything without the prefix
    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value.strip_prefix(PLACEHOLDER_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(Self(value.to_string())),
            _ => Err(SharedError::invalid_placeholder(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a team, project or task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawId", into = "RawId")]
pub enum EntityId {
    /// Created offline, awaiting a server id
    Pending(PlaceholderId),
    /// Assigned by the server
    Confirmed(u64),
}

impl EntityId {
    /// New pending id with a freshly generated placeholder
    pub fn pending() -> Self {
        Self::Pending(PlaceholderId::generate())
    }

    pub fn as_placeholder(&self) -> Option<&PlaceholderId> {
        match self {
            Self::Pending(placeholder) => Some(placeholder),
            Self::Confirmed(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Replace `self` with `Confirmed(real)` if it is exactly `placeholder`
    pub fn confirm(&mut self, placeholder: &PlaceholderId, real: u64) -> bool {
        match self {
            Self::Pending(current) if current == placeholder => {
                *self = Self::Confirmed(real);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(placeholder) => placeholder.fmt(f),
            Self::Confirmed(id) => id.fmt(f),
        }
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::Confirmed(id)
    }
}

impl From<PlaceholderId> for EntityId {
    fn from(placeholder: PlaceholderId) -> Self {
        Self::Pending(placeholder)
    }
}

impl std::str::FromStr for EntityId {
    type Err = SharedError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = value.parse::<u64>() {
            return Ok(Self::Confirmed(id));
        }
        PlaceholderId::parse(value).map(Self::Pending)
    }
}

/// Wire form: servers send numbers, placeholders travel as strings
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl TryFrom<RawId> for EntityId {
    type Error = SharedError;

    fn try_from(raw: RawId) -> Result<Self, Self::Error> {
        match raw {
            RawId::Number(id) => Ok(Self::Confirmed(id)),
            RawId::Text(text) => text.parse(),
        }
    }
}

impl From<EntityId> for RawId {
    fn from(id: EntityId) -> Self {
        match id {
            EntityId::Pending(placeholder) => RawId::Text(placeholder.0),
            EntityId::Confirmed(id) => RawId::Number(id),
        }
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
