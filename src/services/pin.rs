//! Pin service — create, update, delete, and advisory edit locks.
//!
//! DESIGN
//! ======
//! Mutations apply to in-memory room state under the registry write lock and
//! return the committed value for broadcast. Conflict resolution is
//! whole-field last-write-wins in arrival order: a partial update merges only
//! the fields it carries, and the full post-merge pin is what gets emitted.
//!
//! Edit locks are advisory only: they are broadcast so clients can show who
//! is typing, but the server never rejects an update because of one. A lock
//! is released when the text is rewritten, the pin is deleted, or the holder
//! disconnects.

use uuid::Uuid;

use crate::state::{AppState, Pin};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("pin not found: {0}")]
    NotFound(Uuid),
    #[error("room not found: {0}")]
    RoomNotFound(Uuid),
}

/// Fields carried by a `pin_update` command. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct PinPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub text: Option<String>,
}

// =============================================================================
// CREATE
// =============================================================================

/// Create a new pin. The ID is minted server-side; `created_by` and `color`
/// come from the issuing participant.
///
/// # Errors
///
/// Returns `RoomNotFound` if the room is gone.
pub async fn create_pin(
    state: &AppState,
    room_id: Uuid,
    user_id: Uuid,
    x: f64,
    y: f64,
    text: Option<String>,
    color: &str,
) -> Result<Pin, PinError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or(PinError::RoomNotFound(room_id))?;

    let pin = Pin {
        id: Uuid::new_v4(),
        x,
        y,
        text: text.unwrap_or_else(|| "New Note".into()),
        color: color.to_string(),
        created_by: user_id,
    };

    room.pins.insert(pin.id, pin.clone());
    Ok(pin)
}

// =============================================================================
// UPDATE
// =============================================================================

/// Merge the supplied fields into an existing pin and return the full
/// post-merge pin. A rewritten text releases the pin's edit lock.
///
/// # Errors
///
/// Returns `NotFound` for an unknown pin ID — the issuer must hear about a
/// dropped edit, so this is never silent.
pub async fn update_pin(
    state: &AppState,
    room_id: Uuid,
    pin_id: Uuid,
    patch: PinPatch,
) -> Result<Pin, PinError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or(PinError::RoomNotFound(room_id))?;
    let pin = room
        .pins
        .get_mut(&pin_id)
        .ok_or(PinError::NotFound(pin_id))?;

    if let Some(x) = patch.x {
        pin.x = x;
    }
    if let Some(y) = patch.y {
        pin.y = y;
    }
    if let Some(text) = patch.text {
        pin.text = text;
        room.active_edits.remove(&pin_id);
    }

    Ok(pin.clone())
}

// =============================================================================
// DELETE
// =============================================================================

/// Remove a pin and its edit lock. Deleting an unknown pin is an idempotent
/// no-op: returns false and the caller emits nothing.
///
/// # Errors
///
/// Returns `RoomNotFound` if the room is gone.
pub async fn delete_pin(state: &AppState, room_id: Uuid, pin_id: Uuid) -> Result<bool, PinError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or(PinError::RoomNotFound(room_id))?;

    let removed = room.pins.remove(&pin_id).is_some();
    if removed {
        room.active_edits.remove(&pin_id);
    }
    Ok(removed)
}

// =============================================================================
// EDIT LOCKS
// =============================================================================

/// Take the advisory edit lock on a pin. Returns true when the lock was
/// taken; false when the pin is unknown or someone already holds it, in
/// which case nothing is broadcast.
///
/// # Errors
///
/// Returns `RoomNotFound` if the room is gone.
pub async fn start_edit(
    state: &AppState,
    room_id: Uuid,
    pin_id: Uuid,
    user_id: Uuid,
) -> Result<bool, PinError> {
    let mut rooms = state.rooms.write().await;
    let room = rooms
        .get_mut(&room_id)
        .ok_or(PinError::RoomNotFound(room_id))?;

    if !room.pins.contains_key(&pin_id) || room.active_edits.contains_key(&pin_id) {
        return Ok(false);
    }
    room.active_edits.insert(pin_id, user_id);
    Ok(true)
}

#[cfg(test)]
#[path = "pin_test.rs"]
mod tests;
