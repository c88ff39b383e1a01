//! Typed agent identity. The Scheduler (C7) owns pool membership and
//! concurrency limits; this module just names the pools and gives each
//! assigned agent a stable id for Task Store bookkeeping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Coding,
    Utility,
    Browser,
    General,
}

impl PoolKind {
    /// Derives a task's required pool from its `category`, defaulting to
    /// `general` for anything unrecognized, per §4.7 step 3.
    pub fn from_category(category: &str) -> PoolKind {
        match category {
            "coding" => PoolKind::Coding,
            "utility" => PoolKind::Utility,
            "browser" => PoolKind::Browser,
            _ => PoolKind::General,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PoolKind::Coding => "coding",
            PoolKind::Utility => "utility",
            PoolKind::Browser => "browser",
            PoolKind::General => "general",
        }
    }

    pub fn all() -> [PoolKind; 4] {
        [PoolKind::Coding, PoolKind::Utility, PoolKind::Browser, PoolKind::General]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        AgentId(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub agent_id: AgentId,
    pub pool: PoolKind,
    pub model_ref: String,
    /// Subset of registry tool names this agent may call. Empty means
    /// unrestricted — every enabled, non-blocked tool is offered.
    pub tool_subset: Vec<String>,
}

impl Agent {
    pub fn new(pool: PoolKind, model_ref: impl Into<String>) -> Self {
        Agent {
            agent_id: AgentId::new(),
            pool,
            model_ref: model_ref.into(),
            tool_subset: Vec::new(),
        }
    }

    pub fn with_tool_subset(pool: PoolKind, model_ref: impl Into<String>, tool_subset: Vec<String>) -> Self {
        Agent {
            agent_id: AgentId::new(),
            pool,
            model_ref: model_ref.into(),
            tool_subset,
        }
    }

    /// `true` for an unrestricted agent or one whose subset names `tool`.
    pub fn may_call(&self, tool: &str) -> bool {
        self.tool_subset.is_empty() || self.tool_subset.iter().any(|t| t == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_maps_to_pool() {
        assert_eq!(PoolKind::from_category("coding"), PoolKind::Coding);
        assert_eq!(PoolKind::from_category("anything_else"), PoolKind::General);
    }

    #[test]
    fn empty_tool_subset_is_unrestricted() {
        let agent = Agent::new(PoolKind::General, "m");
        assert!(agent.may_call("anything"));
    }

    #[test]
    fn nonempty_tool_subset_restricts_calls() {
        let agent = Agent::with_tool_subset(PoolKind::Coding, "m", vec!["shell".into()]);
        assert!(agent.may_call("shell"));
        assert!(!agent.may_call("list_files"));
    }
}
