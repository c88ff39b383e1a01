//! Supervisor Scheduler (C7): priority dispatch of pending tasks onto the
//! Agent Runtime under global and per-pool concurrency caps.

mod queue;
mod supervisor;
mod types;

pub use queue::DispatchQueue;
pub use supervisor::SupervisorScheduler;
pub use types::SchedulerConfig;
