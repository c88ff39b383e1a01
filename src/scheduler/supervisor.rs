//! Supervisor Scheduler (C7): pulls `pending` tasks off the dispatch queue
//! and hands them to the Agent Runtime under a global concurrency cap, a
//! per-pool cap, and load-aware throttling when a pool's recent success
//! rate drops below a floor.
//!
//! Gates a `JoinSet` of spawned tasks behind an
//! `Arc<tokio::sync::Semaphore>` acquired with `acquire_owned` before each
//! spawn. A permit is a slot, not a literal reusable worker: a fresh
//! [`Agent`](crate::agents::Agent) is minted per task rather than checked
//! out of an idle set.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;

use super::queue::DispatchQueue;
use super::types::SchedulerConfig;
use crate::agents::{Agent, AgentRuntime, PoolKind, TurnOutcome};
use crate::tasks::{Task, TaskFilter, TaskStatus, TaskStore};

struct PoolState {
    semaphore: Arc<Semaphore>,
    outcomes: std::sync::Mutex<VecDeque<bool>>,
}

impl PoolState {
    fn new(cap: usize) -> Self {
        PoolState {
            semaphore: Arc::new(Semaphore::new(cap)),
            outcomes: std::sync::Mutex::new(VecDeque::new()),
        }
    }

    fn record(&self, success: bool, window: usize) {
        let mut outcomes = self.outcomes.lock().expect("poisoned");
        outcomes.push_back(success);
        while outcomes.len() > window {
            outcomes.pop_front();
        }
    }

    /// Below-floor only once there is enough sample to trust, per §4.7's
    /// load-aware throttling rule: thin history should not choke a pool
    /// that just started taking traffic.
    fn success_rate(&self) -> Option<f64> {
        let outcomes = self.outcomes.lock().expect("poisoned");
        if outcomes.len() < 5 {
            return None;
        }
        let successes = outcomes.iter().filter(|o| **o).count();
        Some(successes as f64 / outcomes.len() as f64)
    }
}

pub struct SupervisorScheduler {
    task_store: Arc<TaskStore>,
    runtime: Arc<AgentRuntime>,
    config: SchedulerConfig,
    queue: tokio::sync::Mutex<DispatchQueue>,
    pools: HashMap<PoolKind, PoolState>,
    global: Arc<Semaphore>,
    notify: Notify,
    model_ref: String,
}

impl SupervisorScheduler {
    pub fn new(
        task_store: Arc<TaskStore>,
        runtime: Arc<AgentRuntime>,
        config: SchedulerConfig,
        model_ref: impl Into<String>,
    ) -> Self {
        let mut pools = HashMap::new();
        for pool in PoolKind::all() {
            pools.insert(pool, PoolState::new(config.pool_cap(pool)));
        }
        SupervisorScheduler {
            task_store,
            runtime,
            global: Arc::new(Semaphore::new(config.global_concurrency)),
            queue: tokio::sync::Mutex::new(DispatchQueue::new()),
            pools,
            notify: Notify::new(),
            model_ref: model_ref.into(),
            config,
        }
    }

    /// Loads every `pending` task currently in the store into the dispatch
    /// queue. Called once at startup, after `TaskStore::reconcile_interrupted`
    /// has already put any orphaned `scheduled`/`running` tasks back to
    /// `pending`.
    pub async fn load_pending(&self) -> Result<usize, crate::error::SwarmError> {
        let pending = self
            .task_store
            .query(TaskFilter {
                status: Some(TaskStatus::Pending),
                ..Default::default()
            })
            .await?;
        let n = pending.len();
        let mut queue = self.queue.lock().await;
        for task in pending {
            queue.push(task.task_id, PoolKind::from_category(&task.category), task.priority);
        }
        drop(queue);
        self.notify.notify_one();
        Ok(n)
    }

    pub async fn enqueue(&self, task: &Task) {
        let mut queue = self.queue.lock().await;
        queue.push(task.task_id, PoolKind::from_category(&task.category), task.priority);
        drop(queue);
        self.notify.notify_one();
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Runs the dispatch loop until `shutdown` is observed. Intended to be
    /// spawned as a background task alongside the gateway.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        let mut join_set: JoinSet<(PoolKind, bool)> = JoinSet::new();
        let mut tick = tokio::time::interval(self.config.dispatch_tick);
        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {}
                _ = self.notify.notified() => {}
                Some(done) = join_set.join_next(), if !join_set.is_empty() => {
                    if let Ok((pool, success)) = done {
                        self.pools[&pool].record(success, self.config.success_window);
                    }
                }
            }

            {
                let mut queue = self.queue.lock().await;
                queue.promote_stale(self.config.aging_interval);
            }

            self.dispatch_ready(&mut join_set).await;
        }

        while join_set.join_next().await.is_some() {}
    }

    async fn dispatch_ready(&self, join_set: &mut JoinSet<(PoolKind, bool)>) {
        loop {
            let Ok(global_permit) = self.global.clone().try_acquire_owned() else {
                return;
            };

            let mut dispatched = false;
            for pool in PoolKind::all() {
                let state = &self.pools[&pool];
                if let Some(rate) = state.success_rate() {
                    if rate < self.config.minimum_success_rate
                        && state.semaphore.available_permits() < self.config.pool_cap(pool)
                    {
                        // throttled: only let one in-flight task run until the
                        // pool's rate recovers
                        continue;
                    }
                }
                let Ok(pool_permit) = state.semaphore.clone().try_acquire_owned() else {
                    continue;
                };

                let entry = {
                    let mut queue = self.queue.lock().await;
                    queue.take_best_for_pool(pool)
                };
                let Some(entry) = entry else {
                    drop(pool_permit);
                    continue;
                };

                let task_store = self.task_store.clone();
                let runtime = self.runtime.clone();
                let agent = Agent::with_tool_subset(pool, self.model_ref.clone(), self.config.pool_tool_subset(pool));
                let task_id = entry.task_id;

                join_set.spawn(async move {
                    let _global_permit = global_permit;
                    let _pool_permit = pool_permit;
                    let success = run_one(&task_store, &runtime, &agent, task_id).await;
                    (pool, success)
                });
                dispatched = true;
                break;
            }

            if !dispatched {
                return;
            }
        }
    }
}

async fn run_one(task_store: &TaskStore, runtime: &AgentRuntime, agent: &Agent, task_id: crate::tasks::TaskId) -> bool {
    let task = match task_store.get(task_id).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "task vanished before dispatch");
            return false;
        }
    };

    if task_store.update_status(task_id, TaskStatus::Scheduled, None).await.is_err() {
        return false;
    }
    if task_store.assign_agent(task_id, &agent.agent_id.to_string()).await.is_err() {
        return false;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    match runtime.run_task(&task, agent, cancel).await {
        Ok(TurnOutcome::Succeeded) => true,
        Ok(TurnOutcome::Failed(reason)) => {
            tracing::warn!(task_id = %task_id, reason = %reason, "task turn loop failed");
            false
        }
        Ok(TurnOutcome::Cancelled) => false,
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "task turn loop errored");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::llm::EchoProvider;
    use crate::agents::{AgentRuntime, ApprovalRegistry, RuntimeConfig};
    use crate::event_log::LogStore;
    use crate::guardrails::GuardrailPipeline;
    use crate::sandbox::in_process::InProcessExecutor;
    use crate::sandbox::{Backend, SandboxExecutor, SandboxManager};
    use crate::tasks::{Priority, TaskSpec};
    use crate::tools::ToolRegistry;
    use std::time::Duration;

    async fn harness() -> (Arc<SupervisorScheduler>, Arc<TaskStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = crate::tasks::init_db(&dir.path().join("tasks.sqlite")).expect("db init");
        let task_store = Arc::new(TaskStore::new(pool));
        let log_store = Arc::new(LogStore::new(1024, None));
        let manifest_dir = dir.path().join("tools");
        std::fs::create_dir_all(&manifest_dir).unwrap();
        let in_process: Arc<dyn SandboxExecutor> = Arc::new(InProcessExecutor::new(false));
        let sandbox = Arc::new(SandboxManager::new(
            vec![(Backend::InProcess, in_process)],
            vec![Backend::InProcess],
            Duration::from_secs(1800),
        ));
        let tools = Arc::new(ToolRegistry::new(manifest_dir, sandbox.clone(), Duration::from_secs(5)));
        tools.refresh().await.expect("refresh");
        let guardrails = Arc::new(GuardrailPipeline::new());
        let approvals = ApprovalRegistry::new();
        let llm = Arc::new(EchoProvider);
        let runtime = Arc::new(AgentRuntime::new(
            log_store,
            task_store.clone(),
            tools,
            sandbox,
            guardrails,
            approvals,
            llm,
            RuntimeConfig::default(),
        ));
        let scheduler = Arc::new(SupervisorScheduler::new(
            task_store.clone(),
            runtime,
            SchedulerConfig {
                dispatch_tick: Duration::from_millis(10),
                ..Default::default()
            },
            "echo-model",
        ));
        (scheduler, task_store, dir)
    }

    #[tokio::test]
    async fn enqueued_task_runs_to_completion() {
        let (scheduler, task_store, _dir) = harness().await;
        let ctx = crate::event_log::ContextId::new();
        let task_id = task_store
            .create(TaskSpec {
                title: "say hi".into(),
                description: "hello".into(),
                parent_id: None,
                context_id: ctx,
                category: "general".into(),
                priority: Priority::Medium,
            })
            .await
            .expect("create");
        let task = task_store.get(task_id).await.expect("get");
        scheduler.enqueue(&task).await;

        let shutdown = Arc::new(AtomicBool::new(false));
        let sched = scheduler.clone();
        let handle = tokio::spawn(async move { sched.run(shutdown).await });

        let mut settled = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let t = task_store.get(task_id).await.expect("get");
            if t.status.is_terminal() {
                settled = true;
                break;
            }
        }
        assert!(settled, "task did not settle");
        handle.abort();
    }

    #[tokio::test]
    async fn aging_promotes_queued_entries() {
        let (scheduler, _task_store, _dir) = harness().await;
        scheduler
            .queue
            .lock()
            .await
            .push(crate::tasks::TaskId::new(), PoolKind::General, Priority::Low);
        scheduler.queue.lock().await.promote_stale(Duration::from_millis(0));
        let entry = scheduler.queue.lock().await.take_best_for_pool(PoolKind::General);
        assert_eq!(entry.unwrap().priority, Priority::Medium);
    }
}
