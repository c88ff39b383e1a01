//! Configuration loading and schema.

mod loader;
mod schema;

pub use loader::{default_config_path, load};
pub use schema::{
    AgentConfig, Config, DatabaseConfig, GatewayConfig, GuardrailConfig, LogBusConfig,
    QualityConfig, SandboxConfig, SchedulerConfig, ToolsConfig,
};
