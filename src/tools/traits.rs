//! The `Tool` trait every registry entry implements, and the shapes used to
//! describe and invoke one: a static descriptor plus a `Tool` trait object
//! resolved from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    InProcess,
    Container,
    RemoteSandbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Auto,
    Suggest,
    Block,
}

/// A vetted registry entry, loaded from a manifest file under the tool
/// store directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub dependencies: Vec<String>,
    pub executor_kind: ExecutorKind,
    pub approval_mode: ApprovalMode,
    pub parameters_schema: serde_json::Value,
    pub entry_point: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Name of a credential the tool's dependency loader needs resolved
    /// before the tool is vended to a caller, e.g. `"openai_api_key"`.
    #[serde(default)]
    pub credential: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub artifacts: Vec<(String, serde_json::Value)>,
}

impl ToolOutcome {
    pub fn ok(stdout: impl Into<String>) -> Self {
        ToolOutcome {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            artifacts: Vec::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        ToolOutcome {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            artifacts: Vec::new(),
        }
    }
}

/// A tool's executable behavior. The registry vends `Arc<dyn Tool>` handles
/// resolved once at load time, per the descriptor-first hot-reload strategy
/// in the design notes.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    async fn invoke(&self, args: serde_json::Value) -> Result<ToolOutcome, crate::error::ToolError>;
}
