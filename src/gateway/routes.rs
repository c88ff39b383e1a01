//! Route handlers for the external interface contract of §6: plain async
//! fns taking `State<...>` + `Json<...>`, returning `impl IntoResponse`,
//! against the shared [`GatewayState`].

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agents::ApprovalDecision;
use crate::context::{Attachment, ContextExport, ContextId};
use crate::event_log::Event;
use crate::tasks::{Task, TaskFilter, TaskStatus};

use super::state::{AppState, GatewayState};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "swarmkeep" }))
}

#[derive(Debug, Deserialize)]
pub struct AttachmentDto {
    pub name: String,
    pub content_type: String,
    /// Base64-encoded payload; see [`decode_attachment`].
    pub data_base64: String,
}

fn decode_attachment(dto: AttachmentDto) -> Option<Attachment> {
    let data = BASE64.decode(dto.data_base64.as_bytes()).ok()?;
    Some(Attachment {
        name: dto.name,
        content_type: dto.content_type,
        data,
    })
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub context: Option<ContextId>,
    pub text: String,
    #[allow(dead_code)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentDto>,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub context: ContextId,
}

pub async fn message(State(state): State<AppState>, Json(req): Json<MessageRequest>) -> impl IntoResponse {
    let attachments = req.attachments.into_iter().filter_map(decode_attachment).collect();
    match state.context_manager.post_message(req.context, &req.text, attachments).await {
        Ok(context) => {
            enqueue_latest_pending(&state, context).await;
            (StatusCode::OK, Json(ContextResponse { context })).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

/// The Context Manager creates tasks directly through the Task Store; the
/// gateway is responsible for handing freshly created ones to the
/// Scheduler, since it is the one component that holds both.
async fn enqueue_latest_pending(state: &GatewayState, context_id: ContextId) {
    let pending = state
        .task_store
        .query(TaskFilter {
            context_id: Some(context_id),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap_or_default();
    if let Some(latest) = pending.into_iter().max_by_key(|t: &Task| t.created_at) {
        state.scheduler.enqueue(&latest).await;
    }
}

#[derive(Debug, Deserialize)]
pub struct PollRequest {
    pub context: ContextId,
    pub log_from: u64,
    pub log_guid: Option<uuid::Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub context: ContextId,
    pub log_guid: uuid::Uuid,
    pub log_version: u64,
    pub logs: Vec<Event>,
    pub log_progress: Option<String>,
    pub log_progress_active: bool,
    pub contexts: Vec<ContextId>,
    pub tasks: Vec<Task>,
}

pub async fn poll(State(state): State<AppState>, Json(req): Json<PollRequest>) -> impl IntoResponse {
    let snapshot = state
        .context_manager
        .poll(req.context, req.log_guid, req.log_from, state.poll_timeout)
        .await;
    let contexts = state.context_manager.list().await;
    let tasks = state
        .task_store
        .query(TaskFilter {
            context_id: Some(req.context),
            ..Default::default()
        })
        .await
        .unwrap_or_default();

    Json(PollResponse {
        context: req.context,
        log_guid: snapshot.log_guid,
        log_version: snapshot.log_version,
        logs: snapshot.events,
        log_progress: snapshot.progress,
        log_progress_active: snapshot.progress_active,
        contexts,
        tasks,
    })
}

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub context: ContextId,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub context: ContextId,
    pub paused: bool,
}

pub async fn pause(State(state): State<AppState>, Json(req): Json<PauseRequest>) -> impl IntoResponse {
    state.context_manager.pause(req.context, req.paused).await;
    StatusCode::OK
}

pub async fn nudge(State(state): State<AppState>, Json(req): Json<ContextRequest>) -> impl IntoResponse {
    match state.context_manager.nudge(req.context).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::NOT_FOUND,
    }
}

pub async fn chat_reset(State(state): State<AppState>, Json(req): Json<ContextRequest>) -> impl IntoResponse {
    state.context_manager.reset(req.context).await;
    StatusCode::OK
}

pub async fn chat_remove(State(state): State<AppState>, Json(req): Json<ContextRequest>) -> impl IntoResponse {
    state.context_manager.remove(req.context).await;
    StatusCode::OK
}

pub async fn chat_export(State(state): State<AppState>, Json(req): Json<ContextRequest>) -> impl IntoResponse {
    Json(state.context_manager.export(req.context).await)
}

pub async fn chat_load(State(state): State<AppState>, Json(export): Json<ContextExport>) -> impl IntoResponse {
    let context = state.context_manager.import(export).await;
    Json(ContextResponse { context })
}

#[derive(Debug, Deserialize)]
pub struct ToolApprovalRequest {
    pub context: ContextId,
    pub tool_call_event_id: String,
    pub decision: ApprovalDecisionDto,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecisionDto {
    Approve,
    Reject,
}

impl From<ApprovalDecisionDto> for ApprovalDecision {
    fn from(dto: ApprovalDecisionDto) -> Self {
        match dto {
            ApprovalDecisionDto::Approve => ApprovalDecision::Approve,
            ApprovalDecisionDto::Reject => ApprovalDecision::Reject,
        }
    }
}

pub async fn tool_approval(State(state): State<AppState>, Json(req): Json<ToolApprovalRequest>) -> impl IntoResponse {
    let resolved = state
        .approvals
        .resolve(req.context, &req.tool_call_event_id, req.decision.into())
        .await;
    Json(json!({ "resolved": resolved }))
}

pub const fn default_poll_timeout() -> Duration {
    Duration::from_secs(5)
}
