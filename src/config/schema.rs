//! Configuration schema. Every section implements `Default` so a partial
//! (or absent) TOML file still produces a runnable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub agent: AgentConfig,
    pub sandbox: SandboxConfig,
    pub guardrails: GuardrailConfig,
    pub quality: QualityConfig,
    pub log_bus: LogBusConfig,
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scheduler: SchedulerConfig::default(),
            agent: AgentConfig::default(),
            sandbox: SandboxConfig::default(),
            guardrails: GuardrailConfig::default(),
            quality: QualityConfig::default(),
            log_bus: LogBusConfig::default(),
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Validates cross-field invariants that `Default` alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.global_concurrency == 0 {
            return Err("scheduler.global_concurrency must be > 0".into());
        }
        if self.scheduler.pool_caps.values().any(|&c| c == 0) {
            return Err("scheduler.pool_caps entries must be > 0".into());
        }
        if self.agent.turn_cap == 0 {
            return Err("agent.turn_cap must be > 0".into());
        }
        if self.sandbox.preferred.is_empty() {
            return Err("sandbox.preferred must list at least one backend".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub global_concurrency: usize,
    pub pool_caps: HashMap<String, usize>,
    /// Per-pool tool allow-list: the names an agent minted for that pool
    /// may call, i.e. the `tool_subset` an `Agent` carries. A pool absent
    /// from this map (or mapped to an empty list) is unrestricted — every
    /// enabled, non-blocked tool is offered.
    pub pool_tools: HashMap<String, Vec<String>>,
    pub aging_interval_secs: u64,
    pub minimum_success_rate: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut pool_caps = HashMap::new();
        pool_caps.insert("coding".to_string(), 2);
        pool_caps.insert("utility".to_string(), 2);
        pool_caps.insert("browser".to_string(), 1);
        pool_caps.insert("general".to_string(), 2);
        SchedulerConfig {
            global_concurrency: 3,
            pool_caps,
            pool_tools: HashMap::new(),
            aging_interval_secs: 30,
            minimum_success_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub turn_cap: u32,
    pub task_wallclock_secs: u64,
    pub approval_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            turn_cap: 20,
            task_wallclock_secs: 600,
            approval_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Ordered backend preference, most-isolated first.
    pub preferred: Vec<String>,
    pub session_idle_secs: u64,
    pub call_timeout_secs: u64,
    pub memory_limit_mb: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            preferred: vec!["remote_sandbox".into(), "container".into(), "in_process".into()],
            session_idle_secs: 1800,
            call_timeout_secs: 60,
            memory_limit_mb: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Disables the in-process sandbox backend and escalates high-severity
    /// findings to block.
    pub strict: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        GuardrailConfig { strict: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub enabled: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogBusConfig {
    pub buffer_highwater: usize,
    pub poll_deadline_secs: u64,
}

impl Default for LogBusConfig {
    fn default() -> Self {
        LogBusConfig {
            buffer_highwater: 10_000,
            poll_deadline_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub port: u16,
    pub port_fallback_attempts: u16,
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bind_addr: "127.0.0.1".into(),
            port: 8787,
            port_fallback_attempts: 5,
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "swarmkeep.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub manifest_dir: String,
    pub watch: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            manifest_dir: "tools".into(),
            watch: true,
        }
    }
}
