//! Room service — registry, join/part, cursor presence, and broadcast fan-out.
//!
//! DESIGN
//! ======
//! Rooms are created explicitly (never implicitly by a join) and live only
//! while participants are attached: when the last client parts, the room is
//! evicted from the registry and its contents are gone. A later join for the
//! same ID fails with `NotFound` rather than resurrecting an empty board.
//! Rooms created but never attached to are reaped by a periodic sweep.
//!
//! Participant identity is minted here, never taken from the client: room
//! creation reserves an ID the creator claims once on attach, and any other
//! presented ID is replaced with a fresh mint.
//!
//! All operations take the registry write lock for their whole
//! read-modify-write, which serializes commands per room. Creation under the
//! same lock gives the at-most-one-construction guarantee for a room ID.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::protocol::ServerEvent;
use crate::state::{AppState, Cursor, Participant, Pin, RoomState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room not found: {0}")]
    NotFound(Uuid),
}

/// State handed to a participant on attach: everything needed to render the
/// room, taken atomically with the registration itself.
#[derive(Debug)]
pub struct RoomSnapshot {
    pub pins: Vec<Pin>,
    /// Participants attached before the joiner. Excludes the joiner.
    pub users: Vec<Participant>,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Create a new empty room. Returns the room ID and a reserved participant
/// ID the creator presents when attaching; the reservation is claimable once.
pub async fn create_room(state: &AppState) -> (Uuid, Uuid) {
    let mut rooms = state.rooms.write().await;
    // v4 collisions are not a practical concern, but the registry contract is
    // at-most-one-construction per ID, so keep minting until the slot is free.
    let mut room_id = Uuid::new_v4();
    while rooms.contains_key(&room_id) {
        room_id = Uuid::new_v4();
    }
    let mut room = RoomState::new();
    let user_id = Uuid::new_v4();
    room.reserved.insert(user_id);
    rooms.insert(room_id, room);
    info!(%room_id, %user_id, "room created");
    (room_id, user_id)
}

/// Evict rooms that have no attached clients and are older than `max_idle`.
/// Only rooms created but never attached qualify: a room whose last client
/// parted is evicted immediately by `part_room`.
pub async fn evict_stale_rooms(state: &AppState, max_idle: Duration) -> usize {
    let mut rooms = state.rooms.write().await;
    let before = rooms.len();
    rooms.retain(|_, room| !room.clients.is_empty() || room.created_at.elapsed() < max_idle);
    let evicted = before - rooms.len();
    if evicted > 0 {
        info!(evicted, "swept unclaimed rooms");
    }
    evicted
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Attach a participant to an existing room.
///
/// The participant ID is minted here, server-side: a `requested_id` is
/// honored only when it matches an unclaimed reservation handed out by
/// `create_room`, and the claim consumes the reservation. Anything else —
/// a forged ID, a reused one, a stale one — gets a fresh mint instead of
/// being adopted.
///
/// Registers the outbound channel and returns the snapshot in one critical
/// section, so the snapshot can never miss or double-count a concurrent
/// mutation: every event emitted after this call is also fanned out to `tx`.
///
/// # Errors
///
/// `NotFound` if the room does not exist (it is never created implicitly).
pub async fn join_room(
    state: &AppState,
    room_id: Uuid,
    requested_id: Option<Uuid>,
    username: String,
    color: String,
    tx: mpsc::Sender<ServerEvent>,
) -> Result<(Participant, RoomSnapshot), RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(&room_id).ok_or(RoomError::NotFound(room_id))?;

    let user_id = match requested_id {
        Some(id) if room.reserved.remove(&id) => id,
        _ => Uuid::new_v4(),
    };
    let participant = Participant { id: user_id, username, color, cursor: None };

    let snapshot = RoomSnapshot {
        pins: room.pins.values().cloned().collect(),
        users: room.users.values().cloned().collect(),
    };

    room.clients.insert(user_id, tx);
    room.users.insert(user_id, participant.clone());

    info!(%room_id, %user_id, participants = room.clients.len(), "participant joined room");
    Ok((participant, snapshot))
}

/// Detach a participant. Releases any edit locks they hold. When the last
/// client departs, the room is evicted from the registry.
pub async fn part_room(state: &AppState, room_id: Uuid, user_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };

    room.clients.remove(&user_id);
    room.users.remove(&user_id);
    room.active_edits.retain(|_, editor| *editor != user_id);
    info!(%room_id, %user_id, remaining = room.clients.len(), "participant left room");

    if room.clients.is_empty() {
        rooms.remove(&room_id);
        info!(%room_id, "evicted empty room");
    }
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Record a participant's cursor position. Returns false if the room or
/// participant is gone, in which case nothing should be broadcast.
pub async fn move_cursor(state: &AppState, room_id: Uuid, user_id: Uuid, cursor: Cursor) -> bool {
    let mut rooms = state.rooms.write().await;
    let Some(user) = rooms
        .get_mut(&room_id)
        .and_then(|room| room.users.get_mut(&user_id))
    else {
        return false;
    };
    user.cursor = Some(cursor);
    true
}

/// List the currently connected participants of a room.
///
/// # Errors
///
/// `NotFound` if the room does not exist.
pub async fn list_room_users(state: &AppState, room_id: Uuid) -> Result<Vec<Participant>, RoomError> {
    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
    Ok(room.users.values().cloned().collect())
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Fan an event out to all clients in a room, optionally excluding one.
///
/// Fire-and-forget from the room's perspective: a slow or dead connection is
/// skipped and never stalls command processing.
pub async fn broadcast(state: &AppState, room_id: Uuid, event: &ServerEvent, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&room_id) else {
        return;
    };

    for (user_id, tx) in &room.clients {
        if exclude == Some(*user_id) {
            continue;
        }
        let _ = tx.try_send(event.clone());
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
