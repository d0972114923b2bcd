//! WebSocket transport.
//!
//! One socket per user. On connect the handle is registered in the session
//! directory (replacing any previous connection for the same id), then two
//! loops run until the socket dies: the send task drains the user's
//! outbound event channel onto the wire, and the receive loop parses
//! client events and routes them to the user's room actor.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use home_game::net::events::{ClientEvent, ErrorCode, ServerEvent};
use home_game::net::session::ClientHandle;
use home_game::room::RoomCommand;

use super::AppState;
use crate::metrics;

/// Events queued per connection before the fan-out starts dropping.
const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// `GET /ws?token=<jwt>` — authenticate and upgrade.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let claims = match state.auth.verify(&query.token) {
        Ok(claims) => claims,
        Err(_) => return (StatusCode::UNAUTHORIZED, "invalid token").into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, claims.name, state))
}

async fn handle_socket(socket: WebSocket, user_id: String, username: String, state: AppState) {
    info!(user = %user_id, "websocket connected");
    metrics::websocket_connections_total();

    let (mut sink, mut stream) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    state
        .registry
        .sessions()
        .connect(ClientHandle::new(user_id.clone(), event_tx.clone()))
        .await;
    metrics::websocket_connections_active(
        state.registry.sessions().connected_count().await as u64,
    );

    // Send task: serialize queued events onto the wire.
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!("failed to serialize event: {err}");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Receive loop: parse and route client events.
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                metrics::websocket_events_received();
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        debug!(user = %user_id, "unparseable event: {err}");
                        let _ = event_tx
                            .send(ServerEvent::error(
                                ErrorCode::InvalidAction,
                                format!("invalid event: {err}"),
                            ))
                            .await;
                        continue;
                    }
                };
                route_event(&state, &user_id, &username, event, &event_tx).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(user = %user_id, "websocket error: {err}");
                break;
            }
        }
    }

    // Cleanup: drop the session mapping (unless a newer connection already
    // replaced it) and let the room know.
    if let Some(handle) = state.registry.room_of(&user_id).await {
        let _ = handle
            .send(RoomCommand::Disconnected {
                user_id: user_id.clone(),
            })
            .await;
    }
    state
        .registry
        .sessions()
        .disconnect(&user_id, &event_tx)
        .await;
    metrics::websocket_connections_active(
        state.registry.sessions().connected_count().await as u64,
    );
    send_task.abort();
    info!(user = %user_id, "websocket disconnected");
}

/// Route one client event: joins resolve the invite code here, everything
/// else goes to the user's current room.
async fn route_event(
    state: &AppState,
    user_id: &str,
    username: &str,
    event: ClientEvent,
    event_tx: &mpsc::Sender<ServerEvent>,
) {
    match event {
        ClientEvent::RoomJoin { code, password } => {
            let Some(handle) = state.registry.get_by_code(&code).await else {
                let _ = event_tx
                    .send(ServerEvent::error(ErrorCode::RoomNotFound, "no such room"))
                    .await;
                return;
            };
            // Moving rooms leaves the old one first.
            if let Some(current) = state.registry.room_of(&user_id.to_string()).await
                && current.id() != handle.id()
            {
                let _ = current
                    .send(RoomCommand::Client {
                        user_id: user_id.to_string(),
                        event: ClientEvent::RoomLeave,
                    })
                    .await;
            }
            let (respond, result) = tokio::sync::oneshot::channel();
            let sent = handle
                .send(RoomCommand::Join {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                    password,
                    respond,
                })
                .await;
            if sent.is_err() {
                let _ = event_tx
                    .send(ServerEvent::error(ErrorCode::RoomNotFound, "room closed"))
                    .await;
                return;
            }
            match result.await {
                Ok(Ok(_)) => {}
                Ok(Err(code)) => {
                    let _ = event_tx
                        .send(ServerEvent::error(code, "join failed"))
                        .await;
                }
                Err(_) => {
                    let _ = event_tx
                        .send(ServerEvent::error(ErrorCode::RoomNotFound, "room closed"))
                        .await;
                }
            }
        }
        event => {
            let Some(handle) = state.registry.room_of(&user_id.to_string()).await else {
                let _ = event_tx
                    .send(ServerEvent::error(ErrorCode::NotInRoom, "join a room first"))
                    .await;
                return;
            };
            let _ = handle
                .send(RoomCommand::Client {
                    user_id: user_id.to_string(),
                    event,
                })
                .await;
        }
    }
}
