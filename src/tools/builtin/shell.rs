//! `shell`: runs a command line under a Sandbox Executor (C3).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::sandbox::{ExecRequest, ExitOutcome, NetworkPolicy, SandboxManager, SessionId};
use crate::tools::traits::{Tool, ToolDescriptor, ToolOutcome};

pub struct ShellTool {
    descriptor: ToolDescriptor,
    sandbox: Arc<SandboxManager>,
    call_timeout: Duration,
}

impl ShellTool {
    pub fn new(descriptor: ToolDescriptor, sandbox: Arc<SandboxManager>, call_timeout: Duration) -> Self {
        ShellTool {
            descriptor,
            sandbox,
            call_timeout,
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::ExecutionFailed("missing 'command' argument".into()))?
            .to_string();
        let session_id = args
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(|s| SessionId(s.to_string()))
            .unwrap_or_else(SessionId::new);

        let req = ExecRequest {
            program: command,
            session_id: session_id.clone(),
            timeout: self.call_timeout,
            memory_limit_mb: 512,
            network: NetworkPolicy::Denied,
            env: vec![],
        };

        let outcome = self
            .sandbox
            .execute(req)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        match outcome.exit {
            ExitOutcome::Code(code) => Ok(ToolOutcome {
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exit_code: code,
                artifacts: outcome.artifacts,
            }),
            ExitOutcome::Timeout => Err(ToolError::SandboxTimeout(session_id.0)),
            ExitOutcome::SandboxDown => Err(ToolError::SandboxDown(session_id.0)),
        }
    }
}
