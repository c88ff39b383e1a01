//! The LLM capability consumed by the turn loop, per §6: the caller
//! supplies the tool schema; the provider returns either a final answer
//! or exactly one tool call. A single `complete` operation — no separate
//! streaming method; deltas are reported through the optional callback
//! instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SwarmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The provider's framed response: exactly one of a final answer or a
/// single tool call, never both and never neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Completion {
    FinalAnswer(String),
    ToolCall(ToolCall),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub completion: Completion,
    pub usage: Usage,
}

/// A partial streaming delta, surfaced to the turn loop so it can append
/// `temp=true` thought/assistant events while the model is still
/// generating.
#[derive(Debug, Clone)]
pub struct StreamDelta {
    pub text: String,
}

pub trait StreamSink: Send + Sync {
    fn on_delta(&self, delta: StreamDelta);
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        model_ref: &str,
        messages: &[Message],
        tools_schema: &[ToolSchema],
        stream_sink: Option<&(dyn StreamSink)>,
    ) -> Result<CompletionResult, SwarmError>;
}

/// A deterministic provider for tests and for local smoke-testing the
/// runtime without a network dependency: echoes the last user message
/// back as a final answer, unless it is prefixed `tool:<name> <json>`, in
/// which case it emits that tool call instead.
pub struct EchoProvider;

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn complete(
        &self,
        _model_ref: &str,
        messages: &[Message],
        _tools_schema: &[ToolSchema],
        stream_sink: Option<&(dyn StreamSink)>,
    ) -> Result<CompletionResult, SwarmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if let Some(sink) = stream_sink {
            sink.on_delta(StreamDelta {
                text: last_user.clone(),
            });
        }

        let completion = if let Some(rest) = last_user.strip_prefix("tool:") {
            let mut parts = rest.splitn(2, ' ');
            let name = parts.next().unwrap_or_default().to_string();
            let args: serde_json::Value = parts
                .next()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(serde_json::json!({}));
            Completion::ToolCall(ToolCall { name, arguments: args })
        } else {
            Completion::FinalAnswer(last_user)
        };

        Ok(CompletionResult {
            completion,
            usage: Usage {
                prompt_tokens: 0,
                completion_tokens: 0,
            },
        })
    }
}
