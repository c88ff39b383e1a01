//! The fallback executor: runs the program as a plain child process on the
//! host. Per the design notes and the open-questions decision, this
//! backend is disabled whenever `guardrails.strict` is set, and emits a
//! warning event whenever it is actually used otherwise.

use async_trait::async_trait;
use std::process::Stdio;

use super::traits::{Backend, SandboxExecutor};
use super::types::{ExecOutcome, ExecRequest, ExitOutcome, SessionId};
use crate::error::SandboxError;

pub struct InProcessExecutor {
    strict: bool,
}

impl InProcessExecutor {
    pub fn new(strict: bool) -> Self {
        InProcessExecutor { strict }
    }
}

#[async_trait]
impl SandboxExecutor for InProcessExecutor {
    fn backend(&self) -> Backend {
        Backend::InProcess
    }

    async fn is_available(&self) -> bool {
        !self.strict
    }

    async fn execute(&self, req: ExecRequest) -> Result<ExecOutcome, SandboxError> {
        if self.strict {
            return Err(SandboxError::NoBackend);
        }
        tracing::warn!(session_id = %req.session_id, "executing under the unsandboxed in-process backend");

        let mut command = tokio::process::Command::new("sh");
        command
            .arg("-c")
            .arg(&req.program)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &req.env {
            command.env(k, v);
        }

        let child = command.spawn().map_err(|_| SandboxError::Down)?;
        let output = match tokio::time::timeout(req.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(_)) => return Err(SandboxError::Down),
            Err(_) => return Ok(ExecOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit: ExitOutcome::Timeout,
                artifacts: Vec::new(),
            }),
        };

        Ok(ExecOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit: ExitOutcome::Code(output.status.code().unwrap_or(-1)),
            artifacts: Vec::new(),
        })
    }

    async fn teardown_session(&self, _session_id: &SessionId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn req(program: &str) -> ExecRequest {
        ExecRequest {
            program: program.to_string(),
            session_id: SessionId::new(),
            timeout: Duration::from_secs(5),
            memory_limit_mb: 512,
            network: super::super::types::NetworkPolicy::Denied,
            env: vec![],
        }
    }

    #[tokio::test]
    async fn runs_a_command_and_captures_stdout() {
        let executor = InProcessExecutor::new(false);
        let outcome = executor.execute(req("echo hi")).await.expect("execute");
        assert_eq!(outcome.stdout.trim(), "hi");
        assert_eq!(outcome.exit, ExitOutcome::Code(0));
    }

    #[tokio::test]
    async fn strict_mode_disables_the_backend() {
        let executor = InProcessExecutor::new(true);
        assert!(!executor.is_available().await);
        let result = executor.execute(req("echo hi")).await;
        assert!(matches!(result, Err(SandboxError::NoBackend)));
    }

    #[tokio::test]
    async fn timeout_yields_timeout_sentinel() {
        let mut r = req("sleep 2");
        r.timeout = Duration::from_millis(50);
        let executor = InProcessExecutor::new(false);
        let outcome = executor.execute(r).await.expect("execute");
        assert_eq!(outcome.exit, ExitOutcome::Timeout);
    }
}
