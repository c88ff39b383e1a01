//! Remote sandbox backend: the production-preferred, strongest-isolation
//! executor per §4.3's precedence. This is a consumed external capability
//! (§6) — this crate ships the trait and resolution precedence, not a
//! hosted sandbox service. [`UnconfiguredRemoteSandbox`] is the default
//! when no remote endpoint is configured, so precedence falls through to
//! the container or in-process backend without the caller branching on
//! configuration state.

use async_trait::async_trait;

use super::traits::{Backend, SandboxExecutor};
use super::types::{ExecOutcome, ExecRequest, SessionId};
use crate::error::SandboxError;

#[async_trait]
pub trait RemoteSandboxClient: Send + Sync {
    async fn execute_remote(&self, req: &ExecRequest) -> Result<ExecOutcome, SandboxError>;
    async fn teardown_remote(&self, session_id: &SessionId);
}

pub struct RemoteSandboxExecutor {
    client: Option<Box<dyn RemoteSandboxClient>>,
}

impl RemoteSandboxExecutor {
    pub fn new(client: Option<Box<dyn RemoteSandboxClient>>) -> Self {
        RemoteSandboxExecutor { client }
    }

    pub fn unconfigured() -> Self {
        RemoteSandboxExecutor { client: None }
    }
}

#[async_trait]
impl SandboxExecutor for RemoteSandboxExecutor {
    fn backend(&self) -> Backend {
        Backend::RemoteSandbox
    }

    async fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn execute(&self, req: ExecRequest) -> Result<ExecOutcome, SandboxError> {
        let client = self.client.as_ref().ok_or(SandboxError::NoBackend)?;
        client.execute_remote(&req).await
    }

    async fn teardown_session(&self, session_id: &SessionId) {
        if let Some(client) = &self.client {
            client.teardown_remote(session_id).await;
        }
    }
}
