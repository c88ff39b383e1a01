use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ContextId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ContextId(Uuid::parse_str(s)?))
    }
}

/// One of the seven event types described in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    Thought,
    Progress,
    Error,
}

/// One immutable log entry. `id` is stable within a turn and used to
/// coalesce streaming updates: a later event sharing an `id` with a prior
/// `temp` event tombstones the prior one rather than mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_no: u64,
    pub id: String,
    pub kind: EventKind,
    pub heading: Option<String>,
    pub content: String,
    pub kvps: Vec<(String, serde_json::Value)>,
    pub temp: bool,
    pub timestamp: DateTime<Utc>,
}

/// A new event prior to assignment of `event_no`/`timestamp` by the store.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: String,
    pub kind: EventKind,
    pub heading: Option<String>,
    pub content: String,
    pub kvps: Vec<(String, serde_json::Value)>,
    pub temp: bool,
}

impl NewEvent {
    pub fn new(id: impl Into<String>, kind: EventKind, content: impl Into<String>) -> Self {
        NewEvent {
            id: id.into(),
            kind,
            heading: None,
            content: content.into(),
            kvps: Vec::new(),
            temp: false,
        }
    }

    pub fn temp(mut self, temp: bool) -> Self {
        self.temp = temp;
        self
    }

    pub fn heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn kvp(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.kvps.push((key.into(), value));
        self
    }
}

/// Snapshot returned by a poll read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub log_guid: Uuid,
    pub log_version: u64,
    pub events: Vec<Event>,
    pub progress: Option<String>,
    pub progress_active: bool,
}
