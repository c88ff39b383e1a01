//! Wires every component into a runnable instance from a loaded
//! [`Config`](crate::config::Config): the event bus, stores, and daemon
//! state are all built from one config value in a single place rather
//! than scattering constructor calls across the binary entry point.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::llm::{EchoProvider, LlmProvider};
use crate::agents::{AgentRuntime, ApprovalRegistry, PoolKind, RuntimeConfig};
use crate::config::Config;
use crate::context::ContextManager;
use crate::error::RuntimeError;
use crate::event_log::LogStore;
use crate::guardrails::GuardrailPipeline;
use crate::quality::QualityController;
use crate::sandbox::container::ContainerExecutor;
use crate::sandbox::in_process::InProcessExecutor;
use crate::sandbox::remote::RemoteSandboxExecutor;
use crate::sandbox::{Backend, SandboxExecutor, SandboxManager};
use crate::scheduler::{SchedulerConfig, SupervisorScheduler};
use crate::tasks::TaskStore;
use crate::tools::ToolRegistry;

const DEFAULT_MODEL_REF: &str = "default";
const DEFAULT_CONTAINER_IMAGE: &str = "swarmkeep-sandbox:latest";

/// Every long-lived component, held together for the lifetime of one
/// running instance.
pub struct Runtime {
    pub log_store: Arc<LogStore>,
    pub task_store: Arc<TaskStore>,
    pub tool_registry: Arc<ToolRegistry>,
    pub sandbox: Arc<SandboxManager>,
    pub guardrails: Arc<GuardrailPipeline>,
    pub approvals: Arc<ApprovalRegistry>,
    pub agent_runtime: Arc<AgentRuntime>,
    pub scheduler: Arc<SupervisorScheduler>,
    pub context_manager: Arc<ContextManager>,
    pub quality: Arc<QualityController>,
    pub config: Config,
    /// Kept alive for the duration of the `Runtime`; dropping it stops the
    /// tool manifest hot-reload watch. `None` if the watcher failed to
    /// start (e.g. an exhausted inotify quota), in which case manifests
    /// are only picked up on an explicit `refresh()`.
    _tool_watcher: Option<notify::RecommendedWatcher>,
}

impl Runtime {
    /// Builds every component from `config`, opening (and migrating) the
    /// task database, but does not start the dispatch loop or the
    /// gateway — call [`Runtime::spawn_scheduler`] and
    /// `gateway::serve` separately once the caller is ready to run.
    pub async fn build(config: Config) -> Result<Self, RuntimeError> {
        Self::build_with_llm(config, None).await
    }

    /// As [`Runtime::build`], but with an explicit LLM provider in place
    /// of the default [`EchoProvider`] — the production entry point
    /// supplies a real provider here; tests and local smoke runs leave
    /// it `None`.
    pub async fn build_with_llm(config: Config, llm: Option<Arc<dyn LlmProvider>>) -> Result<Self, RuntimeError> {
        config.validate().map_err(crate::error::ConfigError::Invalid)?;

        let db_path = PathBuf::from(&config.database.path);
        let pool = crate::tasks::init_db(&db_path).map_err(|e| RuntimeError::Database(e.to_string()))?;
        let task_store = Arc::new(TaskStore::new(pool));
        let reconciled = task_store.reconcile_interrupted().await?;
        if reconciled > 0 {
            tracing::warn!(count = reconciled, "reconciled interrupted tasks on startup");
        }

        let log_store = Arc::new(LogStore::new(config.log_bus.buffer_highwater, None));
        let context_manager = Arc::new(ContextManager::new(log_store.clone(), task_store.clone()));

        let sandbox = Arc::new(build_sandbox(&config));
        let manifest_dir = PathBuf::from(&config.tools.manifest_dir);
        let tool_registry = Arc::new(ToolRegistry::new(
            manifest_dir,
            sandbox.clone(),
            Duration::from_secs(config.sandbox.call_timeout_secs),
        ));
        tool_registry.refresh().await?;
        let tool_watcher = if config.tools.watch {
            match tool_registry.spawn_watcher() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "tool manifest hot-reload watcher unavailable, falling back to manual refresh");
                    None
                }
            }
        } else {
            None
        };

        let guardrails = Arc::new(GuardrailPipeline::new());
        let approvals = ApprovalRegistry::new();
        let llm = llm.unwrap_or_else(|| Arc::new(EchoProvider));

        let runtime_config = RuntimeConfig {
            turn_cap: config.agent.turn_cap,
            task_wallclock: Duration::from_secs(config.agent.task_wallclock_secs),
            approval_timeout: Duration::from_secs(config.agent.approval_timeout_secs),
            ..RuntimeConfig::default()
        };
        let agent_runtime = Arc::new(AgentRuntime::new(
            log_store.clone(),
            task_store.clone(),
            tool_registry.clone(),
            sandbox.clone(),
            guardrails.clone(),
            approvals.clone(),
            llm,
            runtime_config,
        ));

        let scheduler_config = scheduler_config_from(&config);
        let scheduler = Arc::new(SupervisorScheduler::new(
            task_store.clone(),
            agent_runtime.clone(),
            scheduler_config,
            DEFAULT_MODEL_REF,
        ));
        let loaded = scheduler.load_pending().await?;
        if loaded > 0 {
            tracing::info!(count = loaded, "loaded pending tasks into dispatch queue");
        }

        let quality = Arc::new(QualityController::new(task_store.clone(), config.quality.enabled));

        Ok(Runtime {
            log_store,
            task_store,
            tool_registry,
            sandbox,
            guardrails,
            approvals,
            agent_runtime,
            scheduler,
            context_manager,
            quality,
            config,
            _tool_watcher: tool_watcher,
        })
    }

    /// Spawns the scheduler's dispatch loop as a background task, returning
    /// the flag the caller should set to request a graceful stop.
    pub fn spawn_scheduler(&self) -> (tokio::task::JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let scheduler = self.scheduler.clone();
        let flag = shutdown.clone();
        let handle = tokio::spawn(async move { scheduler.run(flag).await });
        (handle, shutdown)
    }

    #[cfg(feature = "gateway")]
    pub fn gateway_state(&self) -> crate::gateway::GatewayState {
        crate::gateway::GatewayState {
            context_manager: self.context_manager.clone(),
            task_store: self.task_store.clone(),
            scheduler: self.scheduler.clone(),
            approvals: self.approvals.clone(),
            poll_timeout: crate::gateway::default_poll_timeout(),
        }
    }
}

/// Translates the flat, serializable `config::SchedulerConfig` (its
/// `pool_caps` is a `HashMap<String, usize>` so it round-trips through
/// TOML) into the scheduler's own `PoolKind`-keyed config.
fn scheduler_config_from(config: &Config) -> SchedulerConfig {
    let mut pool_caps = std::collections::HashMap::new();
    let mut pool_tools = std::collections::HashMap::new();
    for pool in PoolKind::all() {
        let cap = config.scheduler.pool_caps.get(pool.as_str()).copied().unwrap_or(2);
        pool_caps.insert(pool, cap);
        if let Some(subset) = config.scheduler.pool_tools.get(pool.as_str()) {
            pool_tools.insert(pool, subset.clone());
        }
    }
    SchedulerConfig {
        global_concurrency: config.scheduler.global_concurrency,
        pool_caps,
        pool_tools,
        aging_interval: Duration::from_secs(config.scheduler.aging_interval_secs),
        minimum_success_rate: config.scheduler.minimum_success_rate,
        success_window: SchedulerConfig::default().success_window,
        dispatch_tick: SchedulerConfig::default().dispatch_tick,
    }
}

/// Builds a [`SandboxManager`] from `config.sandbox.preferred`, wiring in
/// whichever of the three backends the string names, skipping names that
/// don't parse rather than failing startup over a typo.
fn build_sandbox(config: &Config) -> SandboxManager {
    let mut executors: Vec<(Backend, Arc<dyn SandboxExecutor>)> = Vec::new();
    let mut precedence = Vec::new();
    for name in &config.sandbox.preferred {
        let Some(backend) = Backend::parse(name) else {
            tracing::warn!(backend = %name, "unrecognized sandbox backend in config, skipping");
            continue;
        };
        let executor: Arc<dyn SandboxExecutor> = match backend {
            Backend::RemoteSandbox => Arc::new(RemoteSandboxExecutor::unconfigured()),
            Backend::Container => Arc::new(ContainerExecutor::new(DEFAULT_CONTAINER_IMAGE)),
            Backend::InProcess => Arc::new(InProcessExecutor::new(config.guardrails.strict)),
        };
        executors.push((backend, executor));
        precedence.push(backend);
    }
    if precedence.is_empty() {
        precedence.push(Backend::InProcess);
        executors.push((
            Backend::InProcess,
            Arc::new(InProcessExecutor::new(config.guardrails.strict)),
        ));
    }
    SandboxManager::new(executors, precedence, Duration::from_secs(config.sandbox.session_idle_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.database.path = dir.join("tasks.sqlite").to_string_lossy().to_string();
        config.tools.manifest_dir = dir.join("tools").to_string_lossy().to_string();
        config.sandbox.preferred = vec!["in_process".into()];
        config
    }

    #[tokio::test]
    async fn builds_full_stack_from_default_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Runtime::build(test_config(dir.path())).await.expect("build");
        assert_eq!(runtime.scheduler.queue_depth().await, 0);
    }

    #[test]
    fn scheduler_config_maps_named_pool_caps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(dir.path());
        config.scheduler.pool_caps.insert("coding".into(), 7);
        let scheduler_config = scheduler_config_from(&config);
        assert_eq!(scheduler_config.pool_cap(PoolKind::Coding), 7);
        assert_eq!(scheduler_config.pool_cap(PoolKind::Browser), 1);
    }
}
