//! Task Store (C5): persistent task graph with lifecycle guarantees.

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use super::db::DbPool;
use super::models::{TaskRow, TaskUpdateRow};
use super::schema::{task_updates, tasks};
use super::types::{
    Priority, Task, TaskErrorPayload, TaskFilter, TaskId, TaskSpec, TaskStats, TaskStatus,
    TaskUpdate, TaskUpdateKind,
};
use crate::error::TaskError;
use crate::event_log::ContextId;

/// Window within which a `scheduled`/`running` task must be claimed by an
/// agent after a restart, before the reconciler resets it to `pending`.
pub const RECONCILIATION_WINDOW_SECS: i64 = 30;

pub struct TaskStore {
    pool: DbPool,
}

impl TaskStore {
    pub fn new(pool: DbPool) -> Self {
        TaskStore { pool }
    }

    pub async fn create(&self, spec: TaskSpec) -> Result<TaskId, TaskError> {
        if let Some(parent_id) = spec.parent_id {
            let parent = self.get(parent_id).await?;
            if parent.context_id.0 != spec.context_id.0 {
                return Err(TaskError::CrossContextParent {
                    task_id: TaskId::new().to_string(),
                    task_ctx: spec.context_id.to_string(),
                    parent_id: parent_id.to_string(),
                    parent_ctx: parent.context_id.to_string(),
                });
            }
            self.assert_no_cycle(parent_id).await?;
        }

        let task = Task {
            task_id: TaskId::new(),
            parent_id: spec.parent_id,
            context_id: spec.context_id,
            title: spec.title,
            description: spec.description,
            category: spec.category,
            priority: spec.priority,
            status: TaskStatus::Pending,
            assigned_agent_id: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };
        let task_id = task.task_id;
        let row = TaskRow::from_task(&task);

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;

        self.record_update(task_id, TaskUpdateKind::Status, serde_json::json!({"status": "pending"}))
            .await?;

        tracing::info!(task_id = %task_id, "task created");
        Ok(task_id)
    }

    async fn assert_no_cycle(&self, start: TaskId) -> Result<(), TaskError> {
        let mut current = Some(start);
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(TaskError::Cycle(id.to_string()));
            }
            let task = self.get(id).await?;
            current = task.parent_id;
        }
        Ok(())
    }

    pub async fn get(&self, task_id: TaskId) -> Result<Task, TaskError> {
        let pool = self.pool.clone();
        let id_str = task_id.to_string();
        let row: Option<TaskRow> = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            tasks::table
                .filter(tasks::id.eq(&id_str))
                .select(TaskRow::as_select())
                .first(&mut conn)
                .optional()
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;

        let row = row.ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        Task::try_from(row).map_err(TaskError::Database)
    }

    pub async fn update_status(
        &self,
        task_id: TaskId,
        new_status: TaskStatus,
        reason: Option<String>,
    ) -> Result<(), TaskError> {
        let task = self.get(task_id).await?;
        if !task.status.can_transition_to(new_status) {
            return Err(TaskError::IllegalTransition {
                task_id: task_id.to_string(),
                from: task.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let started_at = if task.started_at.is_none() && matches!(new_status, TaskStatus::Running) {
            Some(now)
        } else {
            task.started_at
        };
        let finished_at = if new_status.is_terminal() { Some(now) } else { None };

        let pool = self.pool.clone();
        let id_str = task_id.to_string();
        let status_str = new_status.as_str().to_string();
        let started_str = started_at.map(|t| t.to_rfc3339());
        let finished_str = finished_at.map(|t| t.to_rfc3339());
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::update(tasks::table.filter(tasks::id.eq(&id_str)))
                .set((
                    tasks::status.eq(status_str),
                    tasks::started_at.eq(started_str),
                    tasks::finished_at.eq(finished_str),
                ))
                .execute(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;

        let mut payload = serde_json::json!({"status": new_status.as_str()});
        if let Some(reason) = reason {
            payload["reason"] = serde_json::Value::String(reason);
        }
        self.record_update(task_id, TaskUpdateKind::Status, payload).await?;

        tracing::info!(task_id = %task_id, status = new_status.as_str(), "task status transitioned");
        Ok(())
    }

    /// Records which agent claimed a task, set when the scheduler moves it
    /// to `scheduled`.
    pub async fn assign_agent(&self, task_id: TaskId, agent_id: &str) -> Result<(), TaskError> {
        let pool = self.pool.clone();
        let id_str = task_id.to_string();
        let agent_id = agent_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::update(tasks::table.filter(tasks::id.eq(&id_str)))
                .set(tasks::assigned_agent_id.eq(Some(agent_id)))
                .execute(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;
        Ok(())
    }

    pub async fn attach_result(&self, task_id: TaskId, payload: serde_json::Value) -> Result<(), TaskError> {
        let pool = self.pool.clone();
        let id_str = task_id.to_string();
        let payload_str = payload.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::update(tasks::table.filter(tasks::id.eq(&id_str)))
                .set(tasks::result.eq(Some(payload_str)))
                .execute(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;
        Ok(())
    }

    pub async fn attach_error(&self, task_id: TaskId, error: TaskErrorPayload) -> Result<(), TaskError> {
        let pool = self.pool.clone();
        let id_str = task_id.to_string();
        let error_str = serde_json::to_string(&error).map_err(|e| TaskError::Database(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::update(tasks::table.filter(tasks::id.eq(&id_str)))
                .set(tasks::error.eq(Some(error_str)))
                .execute(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;
        Ok(())
    }

    pub async fn record_update(
        &self,
        task_id: TaskId,
        kind: TaskUpdateKind,
        payload: serde_json::Value,
    ) -> Result<(), TaskError> {
        let update = TaskUpdate {
            update_id: Uuid::new_v4(),
            task_id,
            at: Utc::now(),
            kind,
            payload,
        };
        let row = TaskUpdateRow::from_update(&update);
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::insert_into(task_updates::table)
                .values(&row)
                .execute(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;
        Ok(())
    }

    pub async fn updates_for(&self, task_id: TaskId) -> Result<Vec<TaskUpdate>, TaskError> {
        let pool = self.pool.clone();
        let id_str = task_id.to_string();
        let rows: Vec<TaskUpdateRow> = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            task_updates::table
                .filter(task_updates::task_id.eq(&id_str))
                .order(task_updates::at.asc())
                .select(TaskUpdateRow::as_select())
                .load(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;

        rows.into_iter()
            .map(|r| TaskUpdate::try_from(r).map_err(TaskError::Database))
            .collect()
    }

    pub async fn query(&self, filter: TaskFilter) -> Result<Vec<Task>, TaskError> {
        let pool = self.pool.clone();
        let rows: Vec<TaskRow> = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            let mut query = tasks::table.into_boxed();
            if let Some(ctx) = &filter.context_id {
                query = query.filter(tasks::context_id.eq(ctx.to_string()));
            }
            if let Some(status) = filter.status {
                query = query.filter(tasks::status.eq(status.as_str().to_string()));
            }
            if let Some(parent) = &filter.parent_id {
                query = query.filter(tasks::parent_id.eq(parent.to_string()));
            }
            if let Some(priority) = filter.priority {
                query = query.filter(tasks::priority.eq(priority.as_str().to_string()));
            }
            if let Some(since) = filter.since {
                query = query.filter(tasks::created_at.ge(since.to_rfc3339()));
            }
            if let Some(until) = filter.until {
                query = query.filter(tasks::created_at.le(until.to_rfc3339()));
            }
            query
                .select(TaskRow::as_select())
                .load(&mut conn)
                .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;

        rows.into_iter().map(|r| Task::try_from(r).map_err(TaskError::Database)).collect()
    }

    pub async fn stats(&self) -> Result<TaskStats, TaskError> {
        let all = self.query(TaskFilter::default()).await?;
        let total = all.len() as u64;
        let mut by_status: HashMap<String, u64> = HashMap::new();
        let mut durations = Vec::new();
        let mut succeeded = 0u64;
        let mut terminal = 0u64;
        for task in &all {
            *by_status.entry(task.status.as_str().to_string()).or_insert(0) += 1;
            if task.status.is_terminal() {
                terminal += 1;
                if task.status == TaskStatus::Succeeded {
                    succeeded += 1;
                }
            }
            if let (Some(start), Some(finish)) = (task.started_at, task.finished_at) {
                durations.push((finish - start).num_milliseconds() as f64 / 1000.0);
            }
        }
        let success_rate = if terminal > 0 { succeeded as f64 / terminal as f64 } else { 0.0 };
        let mean_duration_secs = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };

        Ok(TaskStats {
            total,
            by_status,
            success_rate,
            mean_duration_secs,
        })
    }

    /// Resets any task left `scheduled`/`running` from a prior process
    /// lifetime back to `pending`, per §4.5's startup reconciliation. Called
    /// once at startup, after the reconciliation window has notionally
    /// already elapsed (a fresh process has no agents to claim anything).
    pub async fn reconcile_interrupted(&self) -> Result<u64, TaskError> {
        let pool = self.pool.clone();
        let count = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| TaskError::Database(e.to_string()))?;
            diesel::update(
                tasks::table.filter(
                    tasks::status
                        .eq("scheduled")
                        .or(tasks::status.eq("running")),
                ),
            )
            .set((
                tasks::status.eq("pending"),
                tasks::assigned_agent_id.eq(None::<String>),
                tasks::started_at.eq(None::<String>),
            ))
            .execute(&mut conn)
            .map_err(|e| TaskError::Database(e.to_string()))
        })
        .await
        .map_err(|e| TaskError::Database(e.to_string()))??;

        if count > 0 {
            tracing::warn!(count, "reconciled interrupted tasks back to pending");
        }
        Ok(count as u64)
    }
}
