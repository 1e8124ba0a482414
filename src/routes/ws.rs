//! WebSocket gateway — attach, command dispatch, event forwarding.
//!
//! DESIGN
//! ======
//! On upgrade the connection is given a server-minted participant identity
//! and attached to its room, then enters a `select!` loop:
//! - Inbound command envelopes → parse + dispatch against the room
//! - Events fanned out by room peers → forward to the socket
//!
//! Dispatch returns only the events owed to the issuing connection
//! (validation errors); committed mutations are broadcast through the room
//! fan-out, which includes the issuer's own channel unless the event kind
//! suppresses echo (cursor moves).
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → join room (or `error` + close if the room does not exist)
//! 2. Send the single synthetic `init` snapshot
//! 3. Broadcast `user_joined` to the other connections
//! 4. Dispatch inbound commands until the stream ends
//! 5. Close/error/drop → part room → broadcast `user_left`

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{ClientCommand, ServerEvent};
use crate::services;
use crate::services::pin::PinPatch;
use crate::state::{AppState, Cursor};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(username) = params.get("username").cloned() else {
        return (StatusCode::BAD_REQUEST, "username required").into_response();
    };

    // A participant ID minted by the create-room response may be presented
    // here; join_room honors it only against its recorded reservation and
    // mints a fresh ID otherwise. Clients never choose their own identity.
    let requested_id = params.get("user_id").and_then(|s| s.parse().ok());

    ws.on_upgrade(move |socket| run_ws(socket, state, room_id, requested_id, username))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(
    mut socket: WebSocket,
    state: AppState,
    room_id: Uuid,
    requested_id: Option<Uuid>,
    username: String,
) {
    // Per-connection channel for events fanned out by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);

    let (me, snapshot) =
        match services::room::join_room(&state, room_id, requested_id, username, random_color(), client_tx)
            .await
        {
            Ok(joined) => joined,
            Err(e) => {
                warn!(%room_id, error = %e, "ws: attach rejected");
                let _ = send_event(&mut socket, &ServerEvent::Error { message: e.to_string() }).await;
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        };
    let user_id = me.id;
    let color = me.color.clone();

    info!(%room_id, %user_id, "ws: participant connected");

    // The snapshot is the only way a new connection learns prior state;
    // there is no replay of historical events.
    let init = ServerEvent::Init {
        user: me.clone(),
        pins: snapshot.pins,
        users: snapshot.users,
    };
    if send_event(&mut socket, &init).await.is_err() {
        // Already registered by join_room, so peers whose snapshot was taken
        // in the window must still learn of the departure.
        detach(&state, room_id, user_id).await;
        return;
    }

    services::room::broadcast(&state, room_id, &ServerEvent::UserJoined { user: me }, Some(user_id)).await;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for event in process_command(&state, room_id, user_id, &color, &text).await {
                            let _ = send_event(&mut socket, &event).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    detach(&state, room_id, user_id).await;
    info!(%room_id, %user_id, "ws: participant disconnected");
}

/// Every exit path funnels through here so no departure goes unannounced.
/// Parts before notifying, so the leaver never receives its own user_left
/// and an empty room is evicted immediately.
async fn detach(state: &AppState, room_id: Uuid, user_id: Uuid) {
    services::room::part_room(state, room_id, user_id).await;
    services::room::broadcast(state, room_id, &ServerEvent::UserLeft { user_id }, None).await;
}

// =============================================================================
// COMMAND DISPATCH
// =============================================================================

/// Parse and apply one inbound command, broadcasting committed mutations.
/// Returns the events owed to the issuing connection only (errors).
async fn process_command(
    state: &AppState,
    room_id: Uuid,
    user_id: Uuid,
    color: &str,
    text: &str,
) -> Vec<ServerEvent> {
    let cmd: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(%room_id, %user_id, error = %e, "ws: malformed command");
            return vec![ServerEvent::Error { message: format!("malformed command: {e}") }];
        }
    };

    match cmd {
        ClientCommand::PinCreate { x, y, text } => {
            match services::pin::create_pin(state, room_id, user_id, x, y, text, color).await {
                Ok(pin) => {
                    services::room::broadcast(state, room_id, &ServerEvent::PinCreated { pin }, None).await;
                    vec![]
                }
                Err(e) => vec![ServerEvent::Error { message: e.to_string() }],
            }
        }
        ClientCommand::PinUpdate { id, x, y, text } => {
            let patch = PinPatch { x, y, text };
            match services::pin::update_pin(state, room_id, id, patch).await {
                Ok(pin) => {
                    // Echo included: the issuer folds the authoritative
                    // post-merge pin over its optimistic prediction.
                    services::room::broadcast(state, room_id, &ServerEvent::PinUpdated { pin }, None).await;
                    vec![]
                }
                Err(e) => vec![ServerEvent::Error { message: e.to_string() }],
            }
        }
        ClientCommand::PinDelete { id } => {
            match services::pin::delete_pin(state, room_id, id).await {
                // Unknown pin: idempotent no-op, nothing emitted.
                Ok(false) => vec![],
                Ok(true) => {
                    services::room::broadcast(state, room_id, &ServerEvent::PinDeleted { pin_id: id }, None).await;
                    vec![]
                }
                Err(e) => vec![ServerEvent::Error { message: e.to_string() }],
            }
        }
        ClientCommand::CursorMove { x, y } => {
            let cursor = Cursor { x, y };
            if services::room::move_cursor(state, room_id, user_id, cursor).await {
                let event = ServerEvent::CursorMoved { user_id, cursor };
                services::room::broadcast(state, room_id, &event, Some(user_id)).await;
            }
            vec![]
        }
        ClientCommand::StartEdit { pin_id } => {
            match services::pin::start_edit(state, room_id, pin_id, user_id).await {
                Ok(true) => {
                    let event = ServerEvent::EditStarted { pin_id, user_id };
                    services::room::broadcast(state, room_id, &event, None).await;
                    vec![]
                }
                // Unknown pin or lock already held: silent, matching delete.
                Ok(false) => vec![],
                Err(e) => vec![ServerEvent::Error { message: e.to_string() }],
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn random_color() -> String {
    let mut rng = rand::rng();
    format!("#{:06x}", rng.random_range(0..=0x00ff_ffffu32))
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
