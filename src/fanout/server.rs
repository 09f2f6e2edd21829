//! HTTP surface: subscriber WebSocket and health check

use super::{FanoutHub, Subscription};
use crate::feed::ConnectionState;
use crate::pipeline::QueueSender;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

const PONG: &str = r#"{"type":"pong"}"#;

/// Shared handles the HTTP handlers read from
#[derive(Clone)]
pub struct ServerState {
    pub hub: Arc<FanoutHub>,
    pub queue: QueueSender,
    pub feed_state: watch::Receiver<ConnectionState>,
}

/// `/health` payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub dropped_ticks: u64,
    pub websocket_clients: usize,
    pub feed_state: ConnectionState,
}

/// Build the router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/realtime", get(websocket_handler))
        .with_state(state)
}

/// Serve until `shutdown` flips to true
pub async fn serve(
    addr: SocketAddr,
    state: ServerState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Fan-out server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    tracing::info!("Fan-out server stopped");
    Ok(())
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let feed_state = *state.feed_state.borrow();
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        queue_size: state.queue.len(),
        queue_capacity: state.queue.capacity(),
        dropped_ticks: state.queue.dropped(),
        websocket_clients: state.hub.subscriber_count().await,
        feed_state,
    })
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(mut socket: WebSocket, hub: Arc<FanoutHub>) {
    let Subscription { id, mut rx } = hub.connect().await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(payload) = event else { break };
                if socket.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(_))) => {
                        if socket.send(Message::Text(PONG.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.disconnect(id).await;
}
