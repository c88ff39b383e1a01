use async_trait::async_trait;

use super::types::{ExecOutcome, ExecRequest, SessionId};
use crate::error::SandboxError;

/// One of the three backend kinds from §4.3, in the precedence order
/// production config should prefer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    RemoteSandbox,
    Container,
    InProcess,
}

impl Backend {
    pub fn parse(s: &str) -> Option<Backend> {
        match s {
            "remote_sandbox" => Some(Backend::RemoteSandbox),
            "container" => Some(Backend::Container),
            "in_process" => Some(Backend::InProcess),
            _ => None,
        }
    }
}

/// Uniform execute-code interface over {in-process, container,
/// remote-sandbox} backends.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    fn backend(&self) -> Backend;

    /// Whether this backend can currently accept work (e.g. a container
    /// runtime binary is present, or a remote endpoint is configured).
    async fn is_available(&self) -> bool;

    async fn execute(&self, req: ExecRequest) -> Result<ExecOutcome, SandboxError>;

    /// Invalidates a session, releasing any backend-side resources. Called
    /// on idle reap and on `SANDBOX_DOWN` session rebuild.
    async fn teardown_session(&self, session_id: &SessionId);
}

/// Container runtime detection/shell-out, abstracting over Docker/Podman.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    fn binary_name(&self) -> &'static str;

    async fn run(
        &self,
        image: &str,
        program: &str,
        session_id: &SessionId,
        memory_limit_mb: u64,
        network: super::types::NetworkPolicy,
    ) -> Result<std::process::Output, std::io::Error>;

    async fn kill_session(&self, session_id: &SessionId);
}
