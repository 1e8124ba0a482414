//! Wire protocol — JSON envelopes exchanged over a room's WebSocket.
//!
//! DESIGN
//! ======
//! Client→server commands are tagged by `action`, server→client events by
//! `type`. Events always carry the full post-mutation entity (the whole pin,
//! the whole participant), never a delta — this is what makes the client-side
//! fold idempotent and order-independent across observers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{Cursor, Participant, Pin};

// =============================================================================
// COMMANDS (client → server)
// =============================================================================

/// A request from one connection to mutate room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Create a pin at a position. Missing `text` defaults to "New Note".
    PinCreate {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Partial merge: only supplied fields change (whole-field last-write-wins).
    PinUpdate {
        id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    PinDelete { id: Uuid },
    CursorMove { x: f64, y: f64 },
    /// Take the advisory text-edit lock on a pin.
    StartEdit { pin_id: Uuid },
}

// =============================================================================
// EVENTS (server → client)
// =============================================================================

/// An authoritative, ordered notification of a committed state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot sent once on attach. `user` is the receiver's own
    /// identity; `users` lists the other participants already attached.
    Init {
        user: Participant,
        pins: Vec<Pin>,
        users: Vec<Participant>,
    },
    PinCreated { pin: Pin },
    /// Carries the full post-merge pin, not the delta.
    PinUpdated { pin: Pin },
    PinDeleted { pin_id: Uuid },
    UserJoined { user: Participant },
    UserLeft { user_id: Uuid },
    CursorMoved { user_id: Uuid, cursor: Cursor },
    EditStarted { pin_id: Uuid, user_id: Uuid },
    /// Validation failure, delivered to the issuing connection only.
    Error { message: String },
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
