use std::time::Duration;

/// Termination safeguards and timing knobs for a turn loop run, per §4.6
/// and the `turn_cap`/`task_wallclock`/`approval_timeout` configuration
/// options of §6.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub turn_cap: u32,
    pub task_wallclock: Duration,
    pub approval_timeout: Duration,
    pub tool_call_timeout: Duration,
    pub context_window_events: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            turn_cap: 20,
            task_wallclock: Duration::from_secs(600),
            approval_timeout: Duration::from_secs(60),
            tool_call_timeout: Duration::from_secs(30),
            context_window_events: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}
