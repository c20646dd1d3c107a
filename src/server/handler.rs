//! Connection acceptance and per-connection message dispatch.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::protocol::{self, ClientMessage, PresenceState, ServerMessage};

use super::member::{Member, Outbound};
use super::presence;
use super::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let member = Arc::new(Member::new(tx));

    // Greeting goes out before any client frame is processed.
    member.send(&ServerMessage::Hello);

    let mut send_task = writer_loop(rx, sender);
    let monitor = presence::spawn_monitor(member.clone(), state.clone());

    let member_for_read = member.clone();
    let state_for_read = state.clone();
    let mut recv_task =
        tokio::spawn(async move { read_loop(receiver, member_for_read, state_for_read).await });

    // If either side of the connection finishes, tear down the other.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }
    monitor.abort();

    // Unified departure path: client close, transport error, and heartbeat
    // kick all end up here.
    if let Some(room) = member.current_room().await {
        state.registry.leave(&member, &room).await;
    }
    if let Some(peer_id) = member.peer_id() {
        tracing::info!("'{}' disconnected", peer_id);
    } else {
        tracing::debug!("connection closed before hello");
    }
}

/// Drains the outbound channel into the WebSocket sink. `Close` flushes a
/// close frame and ends the task, which tears the whole connection down.
fn writer_loop(
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let result = match command {
                Outbound::Frame(json) => sender.send(Message::Text(json.into())).await,
                Outbound::Ping => sender.send(Message::Ping(Bytes::new())).await,
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if result.is_err() {
                // Transport gone; the departure path handles the rest.
                break;
            }
        }
    })
}

async fn read_loop(mut receiver: SplitStream<WebSocket>, member: Arc<Member>, state: Arc<AppState>) {
    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("websocket error: {}", e);
                break;
            }
        };

        match frame {
            Message::Text(text) => match protocol::decode(text.as_str()) {
                Ok(ClientMessage::Hello { peer_id }) => {
                    if peer_id.is_empty() {
                        // Protocol violation, fatal to this connection. No
                        // room state was ever touched for it.
                        tracing::warn!("hello without a peer ID, closing connection");
                        member.close();
                        break;
                    }
                    if member.set_peer_id(peer_id.clone()) {
                        tracing::info!("peer '{}' announced itself", peer_id);
                    } else {
                        tracing::debug!("peer ID already set, ignoring hello '{}'", peer_id);
                    }
                }
                Ok(ClientMessage::JoinRoom { room }) => {
                    state.registry.join(&member, &room).await;
                }
                Ok(ClientMessage::LeaveRoom { room }) => {
                    state.registry.leave(&member, &room).await;
                }
                Err(e) => {
                    // Non-fatal: drop the frame, keep the connection.
                    tracing::debug!("dropping undecodable frame: {}", e);
                }
            },
            Message::Pong(_) => {
                if member.heartbeat_reply().await {
                    if let Some(room) = member.current_room().await {
                        state
                            .registry
                            .notify_presence(&member, &room, PresenceState::Alive)
                            .await;
                    }
                }
            }
            Message::Close(_) => {
                if let Some(peer_id) = member.peer_id() {
                    tracing::info!("'{}' requested close", peer_id);
                }
                break;
            }
            Message::Ping(_) | Message::Binary(_) => {
                // Pings are answered by the protocol layer; binary frames
                // have no meaning here.
            }
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct RoomSummary {
    pub room: String,
    pub members: Vec<String>,
}

/// Operational view of the current rooms and their members.
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    let rooms = state
        .registry
        .snapshot()
        .await
        .into_iter()
        .map(|(room, members)| RoomSummary { room, members })
        .collect();
    Json(rooms)
}
