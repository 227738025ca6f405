//! Per-connection handler: decode, rate-limit, route.
//!
//! Each accepted connection gets its own task. The socket is split: a
//! writer task pumps the connection's outbound event channel — the same
//! channel the room actor broadcasts into — while this task reads frames
//! and routes them. On exit the seat is not removed: the room is told
//! the connection dropped and the grace window takes it from there.

use std::net::IpAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parlor_protocol::{
    decode_event, encode_event, ClientEvent, ConnId, ErrorKind, RoomId,
    ServerEvent,
};
use parlor_room::{visible_rooms, RoomError, RoomHandle, RoomSettings};
use parlor_session::SessionError;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::server::ServerState;
use crate::transport::WsConn;
use crate::ParlorError;

pub(crate) async fn handle_connection(
    conn: WsConn,
    state: Arc<ServerState>,
) -> Result<(), ParlorError> {
    let WsConn { id, peer_ip, ws } = conn;
    tracing::debug!(%id, "handling new connection");

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerEvent>();
    state
        .registry
        .lock()
        .await
        .bind(id, peer_ip, None, out_tx.clone())?;

    let (mut sink, mut stream) = ws.split();

    // Writer: pumps outbound events until every sender is dropped.
    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match encode_event(&event) {
                Ok(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode event");
                }
            }
        }
        let _ = sink.close().await;
    });

    // Reader: runs until the peer goes away.
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(bytes)) => {
                match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => continue,
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/frame
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                break;
            }
        };
        handle_frame(id, peer_ip, &text, &state, &out_tx).await;
    }

    // Abrupt or clean, the seat survives the connection: tell the room
    // and let the grace window decide.
    let entry = state.registry.lock().await.unbind(id);
    if let Some(entry) = entry {
        if let Some(room_id) = entry.room {
            if let Ok(handle) = state.store.lock().await.get(&room_id) {
                handle.disconnected(id).await;
            }
        }
    }
    tracing::info!(%id, "connection closed");

    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

/// Routes one decoded frame. Every rejection becomes an `error` event to
/// this connection only.
async fn handle_frame(
    id: ConnId,
    ip: IpAddr,
    text: &str,
    state: &Arc<ServerState>,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    // Advisory throttle: over-cap events are dropped with no side effects.
    match state.registry.lock().await.allow_event(id) {
        Ok(()) => {}
        Err(e @ SessionError::RateLimited(_)) => {
            send_error(out_tx, ErrorKind::RateLimit, &e.to_string());
            return;
        }
        Err(_) => return,
    }

    let event = match decode_event(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%id, error = %e, "malformed frame");
            send_error(out_tx, ErrorKind::Validation, "malformed event");
            return;
        }
    };

    match event {
        ClientEvent::CreateRoom {
            name,
            title,
            is_private,
            password,
            game_kind,
            expiry_hours,
            single_seat_per_ip,
            device_id,
        } => {
            create_room(
                id,
                ip,
                state,
                out_tx,
                name,
                RoomSettings::from_request(
                    title,
                    is_private,
                    password,
                    game_kind,
                    expiry_hours,
                    single_seat_per_ip,
                ),
                device_id,
            )
            .await;
        }

        ClientEvent::JoinRoom {
            room_id,
            name,
            password,
            device_id,
        } => {
            join_room(id, ip, state, out_tx, room_id, name, password, device_id)
                .await;
        }

        ClientEvent::LeaveRoom => leave_room(id, state, out_tx).await,

        ClientEvent::ListRooms => list_rooms(id, state, out_tx).await,

        // Everything else happens inside the sender's current room.
        other => {
            let room_id = state
                .registry
                .lock()
                .await
                .get(id)
                .and_then(|entry| entry.room.clone());
            let Some(room_id) = room_id else {
                send_error(out_tx, ErrorKind::State, "join a room first");
                return;
            };
            match room_handle(state, &room_id).await {
                Ok(handle) => {
                    if handle.apply(id, other).await.is_err() {
                        send_error(
                            out_tx,
                            ErrorKind::NotFound,
                            "the room is gone",
                        );
                    }
                }
                Err(e) => send_error(out_tx, e.kind(), &e.to_string()),
            }
        }
    }
}

async fn create_room(
    id: ConnId,
    ip: IpAddr,
    state: &Arc<ServerState>,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
    name: String,
    settings: RoomSettings,
    device_id: Option<String>,
) {
    if already_seated(id, state).await {
        send_error(out_tx, ErrorKind::State, "leave your current room first");
        return;
    }

    // Validate the creator's name before spawning anything.
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 24 {
        send_error(
            out_tx,
            ErrorKind::Validation,
            &RoomError::InvalidName.to_string(),
        );
        return;
    }

    let password = settings.password.clone();
    let handle = state.store.lock().await.create_room(settings);
    let room_id = handle.room_id().clone();

    match handle
        .join(id, name, password, ip, device_id, out_tx.clone())
        .await
    {
        Ok(outcome) => {
            let _ = state.registry.lock().await.set_room(
                id,
                room_id,
                outcome.you.clone(),
            );
            let _ = out_tx.send(ServerEvent::RoomCreated {
                room: outcome.summary,
                you: outcome.you,
            });
        }
        Err(e) => {
            // Never leak a seatless room.
            let _ = handle.shutdown("creation failed").await;
            state.store.lock().await.prune(&room_id);
            send_error(out_tx, e.kind(), &e.to_string());
        }
    }
}

async fn join_room(
    id: ConnId,
    ip: IpAddr,
    state: &Arc<ServerState>,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
    room_id: RoomId,
    name: String,
    password: Option<String>,
    device_id: Option<String>,
) {
    // One seat per connection: a second join requires leaving first.
    if already_seated(id, state).await {
        send_error(out_tx, ErrorKind::State, "leave your current room first");
        return;
    }

    let handle = match room_handle(state, &room_id).await {
        Ok(handle) => handle,
        Err(e) => {
            send_error(out_tx, e.kind(), &e.to_string());
            return;
        }
    };

    match handle
        .join(id, name, password, ip, device_id, out_tx.clone())
        .await
    {
        Ok(outcome) => {
            let _ = state.registry.lock().await.set_room(
                id,
                room_id,
                outcome.you.clone(),
            );
            let _ = out_tx.send(ServerEvent::RoomJoined {
                room: outcome.summary,
                you: outcome.you,
                users: outcome.users,
                reconnected: outcome.reconnected,
                vehicles: outcome.vehicles,
            });
        }
        Err(e) => send_error(out_tx, e.kind(), &e.to_string()),
    }
}

async fn leave_room(
    id: ConnId,
    state: &Arc<ServerState>,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    let room_id = state
        .registry
        .lock()
        .await
        .get(id)
        .and_then(|entry| entry.room.clone());
    let Some(room_id) = room_id else {
        send_error(out_tx, ErrorKind::State, "you are not in a room");
        return;
    };

    match room_handle(state, &room_id).await {
        Ok(handle) => match handle.leave(id).await {
            Ok(()) => state.registry.lock().await.clear_room(id),
            Err(e) => send_error(out_tx, e.kind(), &e.to_string()),
        },
        Err(_) => {
            // The room already closed under us; just clear the binding.
            state.registry.lock().await.clear_room(id);
            let _ = out_tx.send(ServerEvent::RoomLeft);
        }
    }
}

/// Immediate, viewer-filtered room list (the debounced push covers the
/// steady state; this answers an explicit request).
async fn list_rooms(
    id: ConnId,
    state: &Arc<ServerState>,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    let snapshots = state.store.lock().await.snapshots().await;
    let viewer_room = state
        .registry
        .lock()
        .await
        .get(id)
        .and_then(|entry| entry.room.clone());
    let rooms = visible_rooms(&snapshots, viewer_room.as_ref());
    let _ = out_tx.send(ServerEvent::RoomsListUpdated { rooms });
}

async fn room_handle(
    state: &Arc<ServerState>,
    room_id: &RoomId,
) -> Result<RoomHandle, RoomError> {
    state.store.lock().await.get(room_id)
}

async fn already_seated(id: ConnId, state: &Arc<ServerState>) -> bool {
    state
        .registry
        .lock()
        .await
        .get(id)
        .is_some_and(|entry| entry.room.is_some())
}

fn send_error(
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
    kind: ErrorKind,
    message: &str,
) {
    let _ = out_tx.send(ServerEvent::Error {
        kind,
        message: message.to_string(),
    });
}
