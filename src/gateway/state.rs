use std::sync::Arc;
use std::time::Duration;

use crate::agents::ApprovalRegistry;
use crate::context::ContextManager;
use crate::scheduler::SupervisorScheduler;
use crate::tasks::TaskStore;

/// Shared state handed to every route handler. A plain struct behind one
/// `Arc` rather than a single trait object, since the external interface
/// touches several distinct components directly.
pub struct GatewayState {
    pub context_manager: Arc<ContextManager>,
    pub task_store: Arc<TaskStore>,
    pub scheduler: Arc<SupervisorScheduler>,
    pub approvals: Arc<ApprovalRegistry>,
    pub poll_timeout: Duration,
}

pub type AppState = Arc<GatewayState>;
