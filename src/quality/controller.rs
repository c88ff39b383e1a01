//! Quality Controller (C9): scores a succeeded task's output and attaches
//! the assessment as a `TaskUpdate` with `kind=quality`.

use std::sync::Arc;

use crate::agents::PoolKind;
use crate::error::TaskError;
use crate::tasks::{Task, TaskStatus, TaskStore, TaskUpdateKind};

use super::types::QualityAssessment;
use super::{code, completion, text as text_dim};

pub struct QualityController {
    task_store: Arc<TaskStore>,
    enabled: bool,
}

impl QualityController {
    pub fn new(task_store: Arc<TaskStore>, enabled: bool) -> Self {
        QualityController { task_store, enabled }
    }

    /// Returns `Ok(None)` both when scoring is disabled and when the task's
    /// result has no recognizable text to score — a missing assessment,
    /// not an error.
    pub async fn assess(&self, task: &Task) -> Result<Option<QualityAssessment>, TaskError> {
        if !self.enabled || task.status != TaskStatus::Succeeded {
            return Ok(None);
        }
        let Some(text) = extract_text(task) else {
            return Ok(None);
        };

        let assessment = if PoolKind::from_category(&task.category) == PoolKind::Coding {
            code::score_code(&text)
        } else if task.category == "completion" {
            completion::score_completion(&text)
        } else {
            text_dim::score_text(&text, &task.description)
        };

        let payload = serde_json::to_value(&assessment).map_err(|e| TaskError::Database(e.to_string()))?;
        self.task_store.record_update(task.task_id, TaskUpdateKind::Quality, payload).await?;
        Ok(Some(assessment))
    }
}

fn extract_text(task: &Task) -> Option<String> {
    let result = task.result.as_ref()?;
    result.get("text").and_then(|v| v.as_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::ContextId;
    use crate::tasks::{Priority, TaskSpec};

    async fn store() -> Arc<TaskStore> {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = crate::tasks::init_db(&dir.path().join("tasks.sqlite")).expect("db init");
        std::mem::forget(dir);
        Arc::new(TaskStore::new(pool))
    }

    async fn succeeded_task(store: &TaskStore, category: &str, result_text: &str) -> Task {
        let id = store
            .create(TaskSpec {
                title: "t".into(),
                description: "describe the task".into(),
                parent_id: None,
                context_id: ContextId::new(),
                category: category.into(),
                priority: Priority::Medium,
            })
            .await
            .expect("create");
        store.update_status(id, TaskStatus::Scheduled, None).await.unwrap();
        store.update_status(id, TaskStatus::Running, None).await.unwrap();
        store.attach_result(id, serde_json::json!({"text": result_text})).await.unwrap();
        store.update_status(id, TaskStatus::Succeeded, None).await.unwrap();
        store.get(id).await.unwrap()
    }

    #[tokio::test]
    async fn coding_category_routes_to_code_scorer() {
        let store = store().await;
        let task = succeeded_task(&store, "coding", "fn main() {}\n").await;
        let controller = QualityController::new(store.clone(), true);
        let assessment = controller.assess(&task).await.unwrap().unwrap();
        assert_eq!(assessment.dimension_set, "code");
    }

    #[tokio::test]
    async fn disabled_controller_skips_scoring() {
        let store = store().await;
        let task = succeeded_task(&store, "general", "hello").await;
        let controller = QualityController::new(store.clone(), false);
        assert!(controller.assess(&task).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_result_text_is_recorded_as_absent_not_error() {
        let store = store().await;
        let id = store
            .create(TaskSpec {
                title: "t".into(),
                description: "d".into(),
                parent_id: None,
                context_id: ContextId::new(),
                category: "general".into(),
                priority: Priority::Low,
            })
            .await
            .unwrap();
        store.update_status(id, TaskStatus::Scheduled, None).await.unwrap();
        store.update_status(id, TaskStatus::Running, None).await.unwrap();
        store.update_status(id, TaskStatus::Succeeded, None).await.unwrap();
        let task = store.get(id).await.unwrap();
        let controller = QualityController::new(store.clone(), true);
        assert!(controller.assess(&task).await.unwrap().is_none());
    }
}
