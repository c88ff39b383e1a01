//! Tool Registry (C2): vetted, hot-reloadable tool discovery and
//! resolution.

mod builtin;
mod registry;
mod traits;

pub use registry::{ToolFilter, ToolRegistry};
pub use traits::{ApprovalMode, ExecutorKind, Tool, ToolDescriptor, ToolOutcome};
