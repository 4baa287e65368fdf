//! Dashboard bridge: fans `SupervisorEvent`s out over a WebSocket so an
//! operator UI can watch scans, fills, and ticket transitions live.
//!
//! Grounded on `main.rs`'s `websocket_handler`/`handle_socket` pair —
//! kept the on-upgrade + `tokio::select!` recv loop shape, dropped the
//! REST-backed signal replay (there's no persisted signal store here,
//! just the live broadcast channel) and the auth/vault/backtest route
//! surface, which has no counterpart in this engine.

use crate::supervisor::{Supervisor, SupervisorEvent};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct BridgeState {
    supervisor: Arc<Supervisor>,
}

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    let state = BridgeState { supervisor };
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn serve(supervisor: Arc<Supervisor>, bind_addr: SocketAddr) -> std::io::Result<()> {
    let app = router(supervisor);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "dashboard bridge listening");
    axum::serve(listener, app).await
}

async fn health_check() -> &'static str {
    "ok"
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<BridgeState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: BridgeState) {
    let mut rx = state.supervisor.subscribe_events();
    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dashboard bridge client fell behind, skipping");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                if socket.send(Message::Text(encode(&event))).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

fn encode(event: &SupervisorEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|err| {
        warn!("failed to serialize supervisor event: {err}");
        "{}".to_string()
    })
}
