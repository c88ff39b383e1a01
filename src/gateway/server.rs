//! Binds the gateway's router to a local port, falling back to the next
//! port on conflict. No PID-file or token-auth middleware; see
//! DESIGN.md for the scoping rationale.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use super::routes::{
    chat_export, chat_load, chat_remove, chat_reset, health, message, nudge, pause, poll, tool_approval,
};
use super::state::{AppState, GatewayState};

const MAX_PORT_ATTEMPTS: u16 = 10;

pub fn router(state: GatewayState) -> Router {
    let app_state: AppState = Arc::new(state);
    Router::new()
        .route("/health", get(health))
        .route("/message", post(message))
        .route("/poll", post(poll))
        .route("/pause", post(pause))
        .route("/nudge", post(nudge))
        .route("/chat_reset", post(chat_reset))
        .route("/chat_remove", post(chat_remove))
        .route("/chat_export", post(chat_export))
        .route("/chat_load", post(chat_load))
        .route("/tool_approval", post(tool_approval))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn bind_with_fallback(start_port: u16) -> Result<TcpListener, String> {
    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().expect("valid loopback addr");
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(_) if offset + 1 < MAX_PORT_ATTEMPTS => continue,
            Err(e) => {
                return Err(format!(
                    "could not bind to any port in {start_port}-{}: {e}",
                    start_port + MAX_PORT_ATTEMPTS - 1
                ));
            }
        }
    }
    unreachable!()
}

pub async fn serve(state: GatewayState, start_port: u16) -> Result<(), String> {
    let app = router(state);
    let listener = bind_with_fallback(start_port).await?;
    let addr = listener.local_addr().map_err(|e| e.to_string())?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, app).await.map_err(|e| format!("gateway error: {e}"))
}
