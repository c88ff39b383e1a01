use std::collections::HashMap;
use std::time::Duration;

use crate::agents::PoolKind;

/// Dispatch knobs controlling scheduler concurrency: `global_concurrency`
/// and per-pool caps (`pool_caps.{pool}`).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub global_concurrency: usize,
    pub pool_caps: HashMap<PoolKind, usize>,
    /// Per-pool `tool_subset` an `Agent` minted for that pool is given. A
    /// pool absent from this map (or mapped to an empty list) is
    /// unrestricted.
    pub pool_tools: HashMap<PoolKind, Vec<String>>,
    pub aging_interval: Duration,
    pub minimum_success_rate: f64,
    pub success_window: usize,
    pub dispatch_tick: Duration,
}

impl SchedulerConfig {
    pub fn pool_cap(&self, pool: PoolKind) -> usize {
        self.pool_caps.get(&pool).copied().unwrap_or(2)
    }

    pub fn pool_tool_subset(&self, pool: PoolKind) -> Vec<String> {
        self.pool_tools.get(&pool).cloned().unwrap_or_default()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut pool_caps = HashMap::new();
        for pool in PoolKind::all() {
            pool_caps.insert(pool, 2);
        }
        SchedulerConfig {
            global_concurrency: 3,
            pool_caps,
            pool_tools: HashMap::new(),
            aging_interval: Duration::from_secs(30),
            minimum_success_rate: 0.5,
            success_window: 20,
            dispatch_tick: Duration::from_millis(100),
        }
    }
}
