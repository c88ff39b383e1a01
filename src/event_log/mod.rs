//! Event Bus & Log Store (C1): append-only per-context event logs with
//! monotonic versions and long-poll semantics.

mod jsonl;
mod store;
mod types;

pub use jsonl::JsonlMirror;
pub use store::LogStore;
pub use types::{ContextId, Event, EventKind, LogSnapshot, NewEvent};
