use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::event_log::ContextId;

/// A conversational/session identifier plus its pause flag, per §3's
/// Context data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextInfo {
    pub context_id: ContextId,
    pub created_at: DateTime<Utc>,
    pub paused: bool,
    pub log_guid: Uuid,
}

/// A portable document produced by `export`/consumed by `import`: events,
/// not tasks, per §4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextExport {
    pub events: Vec<crate::event_log::Event>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}
