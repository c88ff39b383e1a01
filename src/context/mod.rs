//! Context Manager (C8): binds conversational identifiers to runtime
//! state and mediates the client-facing poll/append API.

mod manager;
mod types;

pub use manager::ContextManager;
pub use types::{Attachment, ContextExport, ContextId, ContextInfo};
