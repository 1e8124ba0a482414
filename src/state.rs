//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the room registry: a map from room ID to live room state. Each
//! room owns its pins, its connected participants, and one outbound channel
//! per connection. Every mutation path goes through the registry write lock,
//! so no two commands against the same room interleave their
//! read-modify-write — arrival order at the lock is the authoritative order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::protocol::ServerEvent;

// =============================================================================
// PIN
// =============================================================================

/// A positioned, editable text note on a room's canvas.
///
/// `id` and `created_by` are immutable once created. `color` is inherited
/// from the creating participant's display color. The canvas is logically
/// infinite, so no bounds are enforced on `x`/`y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: String,
    pub created_by: Uuid,
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// A live cursor position on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

/// One connected user within a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub color: String,
    /// `None` until the first `cursor_move` from this participant.
    pub cursor: Option<Cursor>,
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room live state. Exists only while participants are attached; the
/// registry evicts it when the last client departs.
pub struct RoomState {
    /// Current pins keyed by pin ID.
    pub pins: HashMap<Uuid, Pin>,
    /// Connected participants keyed by participant ID.
    pub users: HashMap<Uuid, Participant>,
    /// Outbound event channels: participant ID -> sender.
    pub clients: HashMap<Uuid, mpsc::Sender<ServerEvent>>,
    /// Advisory text-edit locks: pin ID -> participant editing it.
    pub active_edits: HashMap<Uuid, Uuid>,
    /// Participant IDs minted at room creation, not yet claimed by an attach.
    /// Each reservation is claimable once.
    pub reserved: HashSet<Uuid>,
    /// When the room was created; used to sweep rooms nobody ever attached to.
    pub created_at: Instant,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pins: HashMap::new(),
            users: HashMap::new(),
            clients: HashMap::new(),
            active_edits: HashMap::new(),
            reserved: HashSet::new(),
            created_at: Instant::now(),
        }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — the registry is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<Uuid, RoomState>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
