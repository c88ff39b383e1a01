//! Diesel row types: a plain `Queryable`/`Insertable` row struct per table,
//! kept separate from the domain type ([`crate::tasks::types::Task`]) and
//! bridged by fallible `TryFrom` conversions (timestamps and enums
//! round-trip through text columns).

use diesel::prelude::*;

use super::schema::{task_updates, tasks};
use super::types::{Priority, Task, TaskId, TaskStatus, TaskUpdate, TaskUpdateKind};
use crate::event_log::ContextId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskRow {
    pub id: String,
    pub parent_id: Option<String>,
    pub context_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub assigned_agent_id: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl TaskRow {
    pub fn from_task(task: &Task) -> Self {
        TaskRow {
            id: task.task_id.to_string(),
            parent_id: task.parent_id.map(|p| p.to_string()),
            context_id: task.context_id.to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: task.priority.as_str().to_string(),
            status: task.status.as_str().to_string(),
            assigned_agent_id: task.assigned_agent_id.clone(),
            created_at: task.created_at.to_rfc3339(),
            started_at: task.started_at.map(|t| t.to_rfc3339()),
            finished_at: task.finished_at.map(|t| t.to_rfc3339()),
            result: task.result.as_ref().map(|v| v.to_string()),
            error: task
                .error
                .as_ref()
                .map(|e| serde_json::to_string(e).unwrap_or_default()),
        }
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = String;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            task_id: row.id.parse().map_err(|e| format!("bad task id: {e}"))?,
            parent_id: row
                .parent_id
                .map(|p| p.parse::<TaskId>())
                .transpose()
                .map_err(|e| format!("bad parent id: {e}"))?,
            context_id: row
                .context_id
                .parse::<ContextId>()
                .map_err(|e| format!("bad context id: {e}"))?,
            title: row.title,
            description: row.description,
            category: row.category,
            priority: Priority::parse(&row.priority).ok_or_else(|| format!("bad priority: {}", row.priority))?,
            status: TaskStatus::parse(&row.status).ok_or_else(|| format!("bad status: {}", row.status))?,
            assigned_agent_id: row.assigned_agent_id,
            created_at: parse_rfc3339(&row.created_at)?,
            started_at: row.started_at.as_deref().map(parse_rfc3339).transpose()?,
            finished_at: row.finished_at.as_deref().map(parse_rfc3339).transpose()?,
            result: row.result.as_deref().and_then(|s| serde_json::from_str(s).ok()),
            error: row.error.as_deref().and_then(|s| serde_json::from_str(s).ok()),
        })
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {s}: {e}"))
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = task_updates)]
pub struct TaskUpdateRow {
    pub id: String,
    pub task_id: String,
    pub at: String,
    pub kind: String,
    pub payload: String,
}

impl TaskUpdateRow {
    pub fn from_update(update: &TaskUpdate) -> Self {
        TaskUpdateRow {
            id: update.update_id.to_string(),
            task_id: update.task_id.to_string(),
            at: update.at.to_rfc3339(),
            kind: update.kind.as_str().to_string(),
            payload: update.payload.to_string(),
        }
    }
}

impl TryFrom<TaskUpdateRow> for TaskUpdate {
    type Error = String;

    fn try_from(row: TaskUpdateRow) -> Result<Self, Self::Error> {
        Ok(TaskUpdate {
            update_id: row.id.parse().map_err(|e| format!("bad update id: {e}"))?,
            task_id: row.task_id.parse().map_err(|e| format!("bad task id: {e}"))?,
            at: parse_rfc3339(&row.at)?,
            kind: TaskUpdateKind::parse(&row.kind).ok_or_else(|| format!("bad kind: {}", row.kind))?,
            payload: serde_json::from_str(&row.payload).map_err(|e| format!("bad payload: {e}"))?,
        })
    }
}
