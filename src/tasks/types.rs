use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_log::ContextId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskId(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Ordered so `Critical < High < Medium < Low` sorts highest-priority
    /// first with a plain min-heap.
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// One step toward higher priority, used by the scheduler's aging
    /// promotion. `Critical` is already the ceiling.
    pub fn promoted(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Critical,
            Priority::Critical => Priority::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// The legal transition set from §4.5's state machine.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, Cancelled)
                | (Scheduled, Running)
                | (Scheduled, Cancelled)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "scheduled" => Some(TaskStatus::Scheduled),
            "running" => Some(TaskStatus::Running),
            "succeeded" => Some(TaskStatus::Succeeded),
            "failed" => Some(TaskStatus::Failed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// A structured failure reason, carried in `Task::error` and surfaced to
/// clients under `kvps.error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskErrorPayload {
    pub kind: String,
    pub reason: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
    pub parent_id: Option<TaskId>,
    pub context_id: ContextId,
    pub category: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub parent_id: Option<TaskId>,
    pub context_id: ContextId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub assigned_agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskErrorPayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskUpdateKind {
    Status,
    Progress,
    Annotation,
    Quality,
}

impl TaskUpdateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskUpdateKind::Status => "status",
            TaskUpdateKind::Progress => "progress",
            TaskUpdateKind::Annotation => "annotation",
            TaskUpdateKind::Quality => "quality",
        }
    }

    pub fn parse(s: &str) -> Option<TaskUpdateKind> {
        match s {
            "status" => Some(TaskUpdateKind::Status),
            "progress" => Some(TaskUpdateKind::Progress),
            "annotation" => Some(TaskUpdateKind::Annotation),
            "quality" => Some(TaskUpdateKind::Quality),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub update_id: Uuid,
    pub task_id: TaskId,
    pub at: DateTime<Utc>,
    pub kind: TaskUpdateKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub context_id: Option<ContextId>,
    pub status: Option<TaskStatus>,
    pub parent_id: Option<TaskId>,
    pub priority: Option<Priority>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: u64,
    pub by_status: std::collections::HashMap<String, u64>,
    pub success_rate: f64,
    pub mean_duration_secs: Option<f64>,
}
