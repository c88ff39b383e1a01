//! Concrete tools shipped with the registry: ordinary entries with nothing
//! privileged about their loading, per the entry_point resolution scheme
//! `builtin:<name>`.

mod list_files;
mod shell;

use std::sync::Arc;
use std::time::Duration;

use super::traits::{Tool, ToolDescriptor};
use crate::error::ToolError;
use crate::sandbox::SandboxManager;

pub use list_files::ListFilesTool;
pub use shell::ShellTool;

/// Resolves a manifest's `entry_point` (`builtin:<name>`) to a concrete
/// `Tool` implementation.
pub fn resolve(
    entry_point: &str,
    descriptor: &ToolDescriptor,
    sandbox: Arc<SandboxManager>,
    call_timeout: Duration,
) -> Result<Arc<dyn Tool>, ToolError> {
    match entry_point.strip_prefix("builtin:") {
        Some("list_files") => Ok(Arc::new(ListFilesTool::new(descriptor.clone()))),
        Some("shell") => Ok(Arc::new(ShellTool::new(descriptor.clone(), sandbox, call_timeout))),
        _ => Err(ToolError::ExecutionFailed(format!(
            "unresolvable entry point: {entry_point}"
        ))),
    }
}
