//! Swarmkeep: a multi-agent task orchestration runtime.
//!
//! Wires together an append-only per-context event log, a vetted tool
//! registry, sandboxed execution backends, a synchronous guardrail
//! pipeline, a persistent task graph, agent turn loops, a priority
//! scheduler, and a small HTTP gateway.

pub mod agents;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod event_log;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod guardrails;
pub mod logging;
pub mod quality;
pub mod runtime;
pub mod sandbox;
pub mod scheduler;
pub mod tasks;
pub mod tools;

pub use error::SwarmError;
pub use runtime::Runtime;
