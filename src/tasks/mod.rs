//! Task Store (C5): persistent task graph with lifecycle, updates, queries.

mod db;
mod models;
mod schema;
mod store;
mod types;

pub use db::{init as init_db, DbError, DbPool};
pub use store::{TaskStore, RECONCILIATION_WINDOW_SECS};
pub use types::{
    Priority, Task, TaskErrorPayload, TaskFilter, TaskId, TaskSpec, TaskStats, TaskStatus,
    TaskUpdate, TaskUpdateKind,
};
