//! Satisfies the `POST tool_approval` contract of §6: a pending
//! `suggest`-mode tool call waits on an entry here until the gateway
//! relays an approve/reject decision, or `approval_timeout` elapses and
//! it is treated as a rejection per §4.6 step 5b.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

use crate::event_log::ContextId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Default)]
pub struct ApprovalRegistry {
    pending: Mutex<HashMap<(ContextId, String), oneshot::Sender<ApprovalDecision>>>,
}

impl ApprovalRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(ApprovalRegistry::default())
    }

    /// Registers a pending approval and waits up to `timeout`. Times out
    /// to `Reject`: an unanswered approval request must not leave a tool
    /// call stuck waiting forever.
    pub async fn await_decision(&self, context_id: ContextId, event_id: &str, timeout: Duration) -> ApprovalDecision {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert((context_id, event_id.to_string()), tx);
        }
        let decision = tokio::time::timeout(timeout, rx).await.ok().and_then(|r| r.ok());
        self.pending.lock().await.remove(&(context_id, event_id.to_string()));
        decision.unwrap_or(ApprovalDecision::Reject)
    }

    /// Resolves a pending approval; `false` if no such approval is
    /// outstanding (already timed out, already resolved, or unknown id).
    pub async fn resolve(&self, context_id: ContextId, event_id: &str, decision: ApprovalDecision) -> bool {
        let tx = self.pending.lock().await.remove(&(context_id, event_id.to_string()));
        match tx {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_before_timeout_delivers_decision() {
        let registry = ApprovalRegistry::new();
        let ctx = ContextId::new();
        let registry2 = registry.clone();
        let handle = tokio::spawn(async move { registry2.await_decision(ctx, "evt1", Duration::from_secs(5)).await });
        tokio::task::yield_now().await;
        let resolved = registry.resolve(ctx, "evt1", ApprovalDecision::Approve).await;
        assert!(resolved);
        assert_eq!(handle.await.expect("join"), ApprovalDecision::Approve);
    }

    #[tokio::test]
    async fn unresolved_approval_times_out_as_rejection() {
        let registry = ApprovalRegistry::new();
        let ctx = ContextId::new();
        let decision = registry.await_decision(ctx, "evt1", Duration::from_millis(20)).await;
        assert_eq!(decision, ApprovalDecision::Reject);
    }

    #[tokio::test]
    async fn resolve_unknown_approval_returns_false() {
        let registry = ApprovalRegistry::new();
        let ctx = ContextId::new();
        assert!(!registry.resolve(ctx, "nope", ApprovalDecision::Approve).await);
    }
}
