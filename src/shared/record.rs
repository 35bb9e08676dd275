//! Entity records
//!
//! A [`Record`] is one JSON object as it appears in a mutation body or in a
//! cached collection. The four reference fields are typed as [`EntityId`];
//! everything else passes through untouched in `fields`.

use crate::shared::ids::{EntityId, PlaceholderId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object with typed entity references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<EntityId>,
    /// Remaining fields (name, description, due dates, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_team(mut self, team_id: impl Into<EntityId>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<EntityId>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_parent_task(mut self, parent_task_id: impl Into<EntityId>) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Replace every reference to `placeholder` with `real`.
    ///
    /// Returns true when at least one field changed.
    pub fn rewrite(&mut self, placeholder: &PlaceholderId, real: u64) -> bool {
        let mut changed = false;
        for slot in [
            &mut self.id,
            &mut self.team_id,
            &mut self.project_id,
            &mut self.parent_task_id,
        ] {
            if let Some(id) = slot {
                changed |= id.confirm(placeholder, real);
            }
        }
        changed
    }

    /// Placeholders this record points at through its foreign-key fields
    pub fn foreign_placeholders(&self) -> impl Iterator<Item = &PlaceholderId> {
        [&self.team_id, &self.project_id, &self.parent_task_id]
            .into_iter()
            .filter_map(|slot| slot.as_ref().and_then(EntityId::as_placeholder))
    }

    /// Whether any reference field (own id included) equals `placeholder`
    pub fn mentions(&self, placeholder: &PlaceholderId) -> bool {
        [&self.id, &self.team_id, &self.project_id, &self.parent_task_id]
            .into_iter()
            .any(|slot| slot.as_ref().and_then(EntityId::as_placeholder) == Some(placeholder))
    }
}
