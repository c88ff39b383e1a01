//! Agent Runtime (C6): the turn loop that drives one task to completion,
//! plus the LLM capability trait, typed agent pools, and the
//! tool-approval rendezvous it depends on.

mod approval;
pub mod llm;
mod pool;
mod runtime;
mod types;

pub use approval::{ApprovalDecision, ApprovalRegistry};
pub use pool::{Agent, AgentId, PoolKind};
pub use runtime::AgentRuntime;
pub use types::{RuntimeConfig, TurnOutcome};
