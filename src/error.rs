//! Crate-wide error taxonomy.
//!
//! Every subsystem has its own `thiserror` enum for the errors it can
//! actually produce; [`SwarmError`] folds all of them into the seven
//! categories used for propagation decisions and gateway status mapping.

use thiserror::Error;

/// The seven error categories used for propagation policy.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("safety error: {0}")]
    Safety(String),

    #[error("capacity error: {0}")]
    Capacity(String),

    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("external error: {0}")]
    External(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SwarmError {
    pub fn kind(&self) -> &'static str {
        match self {
            SwarmError::Validation(_) => "validation",
            SwarmError::Safety(_) => "safety",
            SwarmError::Capacity(_) => "capacity",
            SwarmError::Timeout(_) => "timeout",
            SwarmError::Sandbox(_) => "sandbox",
            SwarmError::External(_) => "external",
            SwarmError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(String),
    #[error("illegal transition for task {task_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        task_id: String,
        from: String,
        to: String,
    },
    #[error("cyclic parent/child relation detected at task {0}")]
    Cycle(String),
    #[error("cross-context parent/child relation: task {task_id} context {task_ctx} parent {parent_id} context {parent_ctx}")]
    CrossContextParent {
        task_id: String,
        task_ctx: String,
        parent_id: String,
        parent_ctx: String,
    },
    #[error("database error: {0}")]
    Database(String),
}

impl From<TaskError> for SwarmError {
    fn from(e: TaskError) -> Self {
        match &e {
            TaskError::NotFound(_) | TaskError::IllegalTransition { .. } | TaskError::Cycle(_)
            | TaskError::CrossContextParent { .. } => SwarmError::Validation(e.to_string()),
            TaskError::Database(_) => SwarmError::Internal(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {0} not found")]
    NotFound(String),
    #[error("tool {0} is disabled")]
    Disabled(String),
    #[error("tool {0} is blocked by approval_mode=block")]
    Blocked(String),
    #[error("invalid tool manifest at {path}: {reason}")]
    InvalidManifest { path: String, reason: String },
    #[error("dependency {dep} of tool {tool} is not in the allow-list")]
    UnlistedDependency { tool: String, dep: String },
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),
    #[error("tool approval rejected")]
    ApprovalRejected,
    #[error("tool approval timed out")]
    ApprovalTimeout,
    #[error("credential '{0}' could not be resolved")]
    MissingCredential(String),
    #[error("sandbox call timed out for session {0}")]
    SandboxTimeout(String),
    #[error("sandbox is down for session {0}")]
    SandboxDown(String),
}

impl From<ToolError> for SwarmError {
    fn from(e: ToolError) -> Self {
        match &e {
            ToolError::NotFound(_)
            | ToolError::Disabled(_)
            | ToolError::Blocked(_)
            | ToolError::InvalidManifest { .. }
            | ToolError::UnlistedDependency { .. } => SwarmError::Validation(e.to_string()),
            ToolError::ExecutionFailed(_) => SwarmError::External(e.to_string()),
            ToolError::ApprovalRejected => SwarmError::Validation(e.to_string()),
            ToolError::ApprovalTimeout => SwarmError::Timeout(e.to_string()),
            ToolError::MissingCredential(_) => SwarmError::External(e.to_string()),
            ToolError::SandboxTimeout(_) => SwarmError::Timeout(e.to_string()),
            ToolError::SandboxDown(_) => SwarmError::Sandbox(e.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("sandbox call timed out")]
    Timeout,
    #[error("sandbox is down")]
    Down,
    #[error("sandbox session {0} not found")]
    SessionNotFound(String),
    #[error("no sandbox backend available")]
    NoBackend,
}

impl From<SandboxError> for SwarmError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::Timeout => SwarmError::Timeout(e.to_string()),
            SandboxError::Down | SandboxError::SessionNotFound(_) | SandboxError::NoBackend => {
                SwarmError::Sandbox(e.to_string())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardrailError {
    #[error("input blocked: {0}")]
    InputBlocked(String),
    #[error("output blocked: {0}")]
    OutputBlocked(String),
}

impl From<GuardrailError> for SwarmError {
    fn from(e: GuardrailError) -> Self {
        SwarmError::Safety(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("pool {0} is saturated")]
    PoolSaturated(String),
    #[error("global concurrency limit reached")]
    GlobalSaturated,
    #[error("event bus back-pressure: buffered events above high-water mark")]
    BackPressure,
}

impl From<ScheduleError> for SwarmError {
    fn from(e: ScheduleError) -> Self {
        SwarmError::Capacity(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database initialization failed: {0}")]
    Database(String),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Swarm(#[from] SwarmError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("context {0} not found")]
    ContextNotFound(String),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Swarm(#[from] SwarmError),
}
