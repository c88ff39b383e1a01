//! HTTP gateway exposing §6's external interface over plain POST +
//! long-poll routes, backed by the handful of components those routes
//! actually need rather than a single trait-object event bus.

mod routes;
mod server;
mod state;

pub use routes::default_poll_timeout;
pub use server::{router, serve};
pub use state::GatewayState;
