//! WebSocket upgrade handler and message loop
//!
//! Authentication happens after the upgrade so a rejected client still sees
//! a close frame carrying code 1008 rather than a bare HTTP error. An
//! accepted connection gets:
//!
//! 1. A `connection` ack echoing the resolved identity
//! 2. A write loop draining the registry's outbound queue for this socket
//! 3. A read loop handling client pings and heartbeat pongs

use crate::realtime::protocol::{CLOSE_POLICY_VIOLATION, ClientMessage, ServerMessage};
use crate::realtime::{ConnectionAck, ConnectionHandle, Outbound};
use crate::server::host::ServerHost;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    token: Option<String>,
    /// Zone a rider is currently serving
    zone_id: Option<String>,
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(host): State<Arc<ServerHost>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, host, query))
}

async fn handle_socket(mut socket: WebSocket, host: Arc<ServerHost>, query: WsQuery) {
    let token = query.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if token.is_none() {
        tracing::debug!("WebSocket handshake without token");
        reject(socket, "Token required").await;
        return;
    }

    let (handle, outbound_rx) = match host
        .registry
        .connect(host.verifier.as_ref(), token, query.zone_id)
        .await
    {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket authentication failed");
            reject(socket, "Invalid token").await;
            return;
        }
    };

    let ack = ServerMessage::connection(ConnectionAck {
        message: "Connected".to_string(),
        actor_id: handle.actor_id.clone(),
        role: handle.role,
        connection_id: handle.connection_id.clone(),
    });
    if let Ok(json) = serde_json::to_string(&ack)
        && socket.send(Message::Text(json.into())).await.is_err()
    {
        host.registry
            .unregister(&handle.actor_id, &handle.connection_id);
        return;
    }

    tracing::info!(
        connection_id = %handle.connection_id,
        actor_id = %handle.actor_id,
        role = %handle.role,
        "WebSocket connected"
    );

    let (ws_write, mut ws_read) = socket.split();
    let mut write_task = tokio::spawn(write_loop(
        ws_write,
        outbound_rx,
        handle.connection_id.clone(),
    ));

    let read_loop = async {
        while let Some(result) = ws_read.next().await {
            match result {
                Ok(Message::Text(text)) => handle_client_message(&host, &handle, &text),
                Ok(Message::Pong(_)) => host.registry.heartbeat_ack(&handle.actor_id),
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %handle.connection_id, "Client sent close frame");
                    break;
                }
                Ok(_) => {
                    // Binary frames carry nothing; axum answers transport pings itself
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %handle.connection_id,
                        error = %e,
                        "WebSocket read error"
                    );
                    break;
                }
            }
        }
    };

    // The write loop ends on its own when the registry drops this entry
    tokio::select! {
        _ = read_loop => {}
        _ = &mut write_task => {}
    }

    write_task.abort();
    let removed = host
        .registry
        .unregister(&handle.actor_id, &handle.connection_id);

    tracing::info!(
        connection_id = %handle.connection_id,
        actor_id = %handle.actor_id,
        removed,
        "WebSocket disconnected"
    );
}

async fn write_loop(
    mut ws_write: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    connection_id: String,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let message = match frame {
            Outbound::Message(msg) => match serde_json::to_string(&msg) {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    tracing::error!(
                        connection_id = %connection_id,
                        error = %e,
                        "Failed to serialize ServerMessage"
                    );
                    continue;
                }
            },
            Outbound::Ping => Message::Ping(Default::default()),
            Outbound::Close { code, reason } => {
                tracing::debug!(connection_id = %connection_id, code, reason = %reason, "Closing WebSocket");
                let _ = ws_write.send(close_frame(code, reason)).await;
                break;
            }
        };

        if ws_write.send(message).await.is_err() {
            tracing::debug!(connection_id = %connection_id, "WebSocket write failed, closing");
            break;
        }
    }
}

/// Process a single client text frame
fn handle_client_message(host: &ServerHost, handle: &ConnectionHandle, text: &str) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => {
            host.registry.heartbeat_ack(&handle.actor_id);
            ServerMessage::pong()
        }
        Err(e) => ServerMessage::error(format!("Invalid message: {}", e)),
    };

    // Replies share the outbound queue so they stay ordered with events
    let Some(connection) = host
        .registry
        .lookup(&handle.actor_id)
        .filter(|c| c.connection_id == handle.connection_id)
    else {
        return;
    };
    if let Err(e) = connection.send(Outbound::Message(reply)) {
        tracing::debug!(connection_id = %handle.connection_id, error = %e, "Reply dropped");
    }
}

async fn reject(mut socket: WebSocket, reason: &str) {
    let _ = socket
        .send(close_frame(CLOSE_POLICY_VIOLATION, reason.to_string()))
        .await;
}

fn close_frame(code: u16, reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
