//! Context Manager (C8): binds conversational identifiers to runtime
//! state and mediates the client-facing poll/append API. A keyed session
//! map behind an `RwLock` with get-or-create, idempotent-creation
//! semantics, keyed by opaque context ids backed by the Event Bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_log::{ContextId, EventKind, LogSnapshot, LogStore, NewEvent};
use crate::tasks::{Priority, TaskSpec, TaskStore};

use super::types::{Attachment, ContextExport, ContextInfo};

const DEFAULT_GENERAL_POOL: &str = "general";

pub struct ContextManager {
    log_store: Arc<LogStore>,
    task_store: Arc<TaskStore>,
    contexts: RwLock<HashMap<ContextId, ContextMeta>>,
}

struct ContextMeta {
    created_at: chrono::DateTime<Utc>,
    paused: bool,
}

impl ContextManager {
    pub fn new(log_store: Arc<LogStore>, task_store: Arc<TaskStore>) -> Self {
        ContextManager {
            log_store,
            task_store,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    async fn ensure(&self, context_id: ContextId) {
        let mut contexts = self.contexts.write().await;
        contexts.entry(context_id).or_insert_with(|| ContextMeta {
            created_at: Utc::now(),
            paused: false,
        });
    }

    /// Appends a user event to `context_id` (creating one if absent) and
    /// enqueues a task targeting the general pool at medium priority.
    pub async fn post_message(
        &self,
        context_id: Option<ContextId>,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<ContextId, crate::error::TaskError> {
        let context_id = context_id.unwrap_or_default();
        self.ensure(context_id).await;

        let mut event = NewEvent::new(Uuid::new_v4().to_string(), EventKind::User, text.to_string());
        if !attachments.is_empty() {
            let names: Vec<_> = attachments.iter().map(|a| a.name.clone()).collect();
            event = event.kvp("attachments", serde_json::json!(names));
        }
        self.log_store.append(context_id, event).await;

        self.task_store
            .create(TaskSpec {
                title: text.chars().take(80).collect(),
                description: text.to_string(),
                parent_id: None,
                context_id,
                category: DEFAULT_GENERAL_POOL.to_string(),
                priority: Priority::Medium,
            })
            .await?;

        Ok(context_id)
    }

    /// Delegates to the Event Bus; allocates a context (and a fresh
    /// `log_guid`) if `context_id` is unknown, per §4.8.
    pub async fn poll(&self, context_id: ContextId, caller_log_guid: Option<Uuid>, from_version: u64, timeout: Duration) -> LogSnapshot {
        self.ensure(context_id).await;
        self.log_store.read(context_id, caller_log_guid, from_version, timeout).await
    }

    pub async fn pause(&self, context_id: ContextId, value: bool) {
        self.ensure(context_id).await;
        let mut contexts = self.contexts.write().await;
        if let Some(meta) = contexts.get_mut(&context_id) {
            meta.paused = value;
        }
    }

    pub async fn is_paused(&self, context_id: ContextId) -> bool {
        self.contexts.read().await.get(&context_id).map(|m| m.paused).unwrap_or(false)
    }

    /// Promotes the context's most recently enqueued non-terminal task one
    /// priority rank, bypassing the scheduler's normal aging cadence. A
    /// manual escalation signal, not a cancellation or a new message.
    pub async fn nudge(&self, context_id: ContextId) -> Result<(), crate::error::TaskError> {
        let tasks = self
            .task_store
            .query(crate::tasks::TaskFilter {
                context_id: Some(context_id),
                ..Default::default()
            })
            .await?;
        let Some(latest) = tasks
            .into_iter()
            .filter(|t| !t.status.is_terminal())
            .max_by_key(|t| t.created_at)
        else {
            return Ok(());
        };
        self.task_store
            .record_update(
                latest.task_id,
                crate::tasks::TaskUpdateKind::Annotation,
                serde_json::json!({"nudged_at": Utc::now(), "promoted_to": latest.priority.promoted().as_str()}),
            )
            .await?;
        Ok(())
    }

    pub async fn reset(&self, context_id: ContextId) {
        self.ensure(context_id).await;
        self.log_store.reset(context_id).await;
    }

    pub async fn remove(&self, context_id: ContextId) {
        self.log_store.remove(context_id).await;
        self.contexts.write().await.remove(&context_id);
    }

    pub async fn export(&self, context_id: ContextId) -> ContextExport {
        let events = self.log_store.export_events(context_id).await;
        ContextExport {
            events,
            exported_at: Utc::now(),
        }
    }

    /// Mints a new context id and seeds its log from `export`, per §4.8's
    /// "a new context_id is minted" rule.
    pub async fn import(&self, export: ContextExport) -> ContextId {
        let context_id = ContextId::new();
        self.ensure(context_id).await;
        self.log_store.import_events(context_id, export.events).await;
        context_id
    }

    pub async fn info(&self, context_id: ContextId) -> Option<ContextInfo> {
        let (created_at, paused) = {
            let contexts = self.contexts.read().await;
            let meta = contexts.get(&context_id)?;
            (meta.created_at, meta.paused)
        };
        let log_guid = self.log_store.guid(context_id).await;
        Some(ContextInfo {
            context_id,
            created_at,
            paused,
            log_guid,
        })
    }

    pub async fn list(&self) -> Vec<ContextId> {
        self.contexts.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskStore;

    async fn manager() -> (ContextManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = crate::tasks::init_db(&dir.path().join("tasks.sqlite")).expect("init db");
        let log_store = Arc::new(LogStore::new(10_000, None));
        let task_store = Arc::new(TaskStore::new(pool));
        (ContextManager::new(log_store, task_store), dir)
    }

    #[tokio::test]
    async fn post_message_creates_context_and_task() {
        let (mgr, _dir) = manager().await;
        let ctx = mgr.post_message(None, "hello there", vec![]).await.expect("post");
        let snap = mgr.poll(ctx, None, 0, Duration::from_millis(10)).await;
        assert_eq!(snap.events.len(), 1);
        assert_eq!(snap.events[0].content, "hello there");
    }

    #[tokio::test]
    async fn unknown_context_poll_allocates_one() {
        let (mgr, _dir) = manager().await;
        let ctx = ContextId::new();
        let snap = mgr.poll(ctx, None, 0, Duration::from_millis(10)).await;
        assert!(snap.events.is_empty());
        assert!(mgr.info(ctx).await.is_some());
    }

    #[tokio::test]
    async fn pause_toggles_flag() {
        let (mgr, _dir) = manager().await;
        let ctx = ContextId::new();
        mgr.pause(ctx, true).await;
        assert!(mgr.is_paused(ctx).await);
        mgr.pause(ctx, false).await;
        assert!(!mgr.is_paused(ctx).await);
    }

    #[tokio::test]
    async fn reset_rotates_guid() {
        let (mgr, _dir) = manager().await;
        let ctx = mgr.post_message(None, "hi", vec![]).await.expect("post");
        let before = mgr.info(ctx).await.expect("info");
        mgr.reset(ctx).await;
        let after = mgr.info(ctx).await.expect("info");
        assert_ne!(before.log_guid, after.log_guid);
    }

    #[tokio::test]
    async fn export_then_import_mints_new_context() {
        let (mgr, _dir) = manager().await;
        let ctx = mgr.post_message(None, "hi there", vec![]).await.expect("post");
        let export = mgr.export(ctx).await;
        let imported = mgr.import(export).await;
        assert_ne!(imported, ctx);
        let snap = mgr.poll(imported, None, 0, Duration::from_millis(10)).await;
        assert_eq!(snap.events.len(), 1);
    }

    #[tokio::test]
    async fn remove_clears_context() {
        let (mgr, _dir) = manager().await;
        let ctx = mgr.post_message(None, "hi", vec![]).await.expect("post");
        mgr.remove(ctx).await;
        assert!(mgr.info(ctx).await.is_none());
    }
}
