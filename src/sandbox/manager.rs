//! Selects among the three backends by configured precedence, and owns
//! the idle-session reaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::traits::{Backend, SandboxExecutor};
use super::types::{ExecOutcome, ExecRequest, SessionId};
use crate::error::SandboxError;

struct SessionRecord {
    backend: Backend,
    last_used: Instant,
}

pub struct SandboxManager {
    executors: HashMap<Backend, Arc<dyn SandboxExecutor>>,
    precedence: Vec<Backend>,
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
    session_idle: Duration,
}

impl SandboxManager {
    pub fn new(
        executors: Vec<(Backend, Arc<dyn SandboxExecutor>)>,
        precedence: Vec<Backend>,
        session_idle: Duration,
    ) -> Self {
        SandboxManager {
            executors: executors.into_iter().collect(),
            precedence,
            sessions: Mutex::new(HashMap::new()),
            session_idle,
        }
    }

    async fn select_backend(&self) -> Result<Arc<dyn SandboxExecutor>, SandboxError> {
        for backend in &self.precedence {
            if let Some(executor) = self.executors.get(backend) {
                if executor.is_available().await {
                    return Ok(executor.clone());
                }
            }
        }
        Err(SandboxError::NoBackend)
    }

    /// Executes `req`. If the session named in `req` has gone idle beyond
    /// the configured window, it is torn down first and the call proceeds
    /// against a fresh session under the same id — per §8's boundary
    /// behavior, a stale session is unreachable and a new call starts
    /// fresh.
    pub async fn execute(&self, req: ExecRequest) -> Result<ExecOutcome, SandboxError> {
        self.reap_if_stale(&req.session_id).await;

        let executor = self.select_backend().await?;
        let session_id = req.session_id.clone();
        let outcome = executor.execute(req).await?;
        self.touch_session(session_id, executor.backend()).await;
        Ok(outcome)
    }

    async fn touch_session(&self, session_id: SessionId, backend: Backend) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id,
            SessionRecord {
                backend,
                last_used: Instant::now(),
            },
        );
    }

    async fn reap_if_stale(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.lock().await;
        let Some(record) = sessions.get(session_id) else {
            return;
        };
        if record.last_used.elapsed() >= self.session_idle {
            let backend = record.backend;
            sessions.remove(session_id);
            drop(sessions);
            if let Some(executor) = self.executors.get(&backend) {
                executor.teardown_session(session_id).await;
            }
        }
    }

    /// Tears a session down explicitly, used by the Agent Runtime's
    /// one-retry-after-`SANDBOX_DOWN` policy (§4.7).
    pub async fn rebuild_session(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(record) = sessions.remove(session_id) {
            drop(sessions);
            if let Some(executor) = self.executors.get(&record.backend) {
                executor.teardown_session(session_id).await;
            }
        }
    }

    /// Sweeps every tracked session for staleness. Intended to run on a
    /// periodic `tokio::time::interval` tick from the owning runtime.
    pub async fn sweep_idle_sessions(&self) {
        let stale: Vec<(SessionId, Backend)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .filter(|(_, r)| r.last_used.elapsed() >= self.session_idle)
                .map(|(id, r)| (id.clone(), r.backend))
                .collect()
        };
        if stale.is_empty() {
            return;
        }
        let mut sessions = self.sessions.lock().await;
        for (id, _) in &stale {
            sessions.remove(id);
        }
        drop(sessions);
        for (id, backend) in stale {
            if let Some(executor) = self.executors.get(&backend) {
                executor.teardown_session(&id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::in_process::InProcessExecutor;
    use crate::sandbox::types::{ExitOutcome, NetworkPolicy};

    fn manager(session_idle: Duration) -> SandboxManager {
        let in_process: Arc<dyn SandboxExecutor> = Arc::new(InProcessExecutor::new(false));
        SandboxManager::new(
            vec![(Backend::InProcess, in_process)],
            vec![Backend::RemoteSandbox, Backend::Container, Backend::InProcess],
            session_idle,
        )
    }

    fn req(session_id: SessionId) -> ExecRequest {
        ExecRequest {
            program: "echo hi".into(),
            session_id,
            timeout: Duration::from_secs(5),
            memory_limit_mb: 512,
            network: NetworkPolicy::Denied,
            env: vec![],
        }
    }

    #[tokio::test]
    async fn falls_through_unavailable_backends_to_in_process() {
        let manager = manager(Duration::from_secs(60));
        let outcome = manager.execute(req(SessionId::new())).await.expect("execute");
        assert_eq!(outcome.exit, ExitOutcome::Code(0));
    }

    #[tokio::test]
    async fn stale_session_is_reaped_before_reuse() {
        let manager = manager(Duration::from_millis(10));
        let session_id = SessionId::new();
        manager.execute(req(session_id.clone())).await.expect("first call");
        tokio::time::sleep(Duration::from_millis(30)).await;
        // A second call against the same (now-stale) session id still
        // succeeds: it is reaped and a fresh session starts transparently.
        let outcome = manager.execute(req(session_id)).await.expect("second call");
        assert_eq!(outcome.exit, ExitOutcome::Code(0));
    }
}
