//! Queued mutations
//!
//! A [`QueuedMutation`] is a write a screen could not deliver because the
//! device was offline. It carries everything needed to replay the request
//! later: endpoint, method, headers and a [`Record`] body.

use crate::shared::error::SharedError;
use crate::shared::ids::{EntityId, PlaceholderId};
use crate::shared::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods a queued mutation may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = SharedError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(SharedError::validation(
                "method",
                format!("unsupported HTTP method: {}", other),
            )),
        }
    }
}

/// What a mutation does, which decides how its response is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    CreateTeam,
    CreateProject,
    CreateTask,
    /// Any other POST/PUT/DELETE; no id comes back
    Generic,
}

impl MutationKind {
    /// Infer the kind from the endpoint's last path segment
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        match path.trim_end_matches('/').rsplit('/').next() {
            Some("createTeam") => MutationKind::CreateTeam,
            Some("createProject") => MutationKind::CreateProject,
            Some("createTask") => MutationKind::CreateTask,
            _ => MutationKind::Generic,
        }
    }

    /// Response field holding the server-assigned id
    pub fn response_id_field(&self) -> Option<&'static str> {
        match self {
            MutationKind::CreateTeam | MutationKind::CreateProject => Some("id"),
            MutationKind::CreateTask => Some("task_id"),
            MutationKind::Generic => None,
        }
    }

    /// Telemetry event emitted after a successful replay
    pub fn created_event(&self) -> Option<&'static str> {
        match self {
            MutationKind::CreateTeam => Some("team_created"),
            MutationKind::CreateProject => Some("project_created"),
            MutationKind::CreateTask => Some("task_created"),
            MutationKind::Generic => None,
        }
    }

    pub fn is_create(&self) -> bool {
        !matches!(self, MutationKind::Generic)
    }
}

/// A deferred write waiting for connectivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub url: String,
    pub kind: MutationKind,
    pub method: HttpMethod,
    pub body: Record,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl QueuedMutation {
    /// Build a mutation, inferring its kind from `url`
    pub fn new(url: impl Into<String>, method: HttpMethod, body: Record) -> Self {
        let url = url.into();
        Self {
            kind: MutationKind::from_url(&url),
            url,
            method,
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn create_team(body: Record) -> Self {
        Self::new("/createTeam", HttpMethod::Post, body)
    }

    pub fn create_project(body: Record) -> Self {
        Self::new("/createProject", HttpMethod::Post, body)
    }

    pub fn create_task(body: Record) -> Self {
        Self::new("/createTask", HttpMethod::Post, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    /// Placeholder this mutation will turn into a real id on success
    pub fn creates(&self) -> Option<&PlaceholderId> {
        if !self.kind.is_create() {
            return None;
        }
        self.body.id.as_ref().and_then(EntityId::as_placeholder)
    }

    /// Placeholders that must be confirmed before this mutation can be sent
    pub fn depends_on(&self) -> Vec<&PlaceholderId> {
        let mut deps: Vec<&PlaceholderId> = self.body.foreign_placeholders().collect();
        if !self.kind.is_create() {
            if let Some(own) = self.body.id.as_ref().and_then(EntityId::as_placeholder) {
                deps.push(own);
            }
        }
        deps
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|key| key.eq_ignore_ascii_case(name))
    }
}
