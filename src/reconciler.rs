//! Client-side read model — pure event fold plus optimistic drag prediction.
//!
//! DESIGN
//! ======
//! The view advances exclusively through `apply`, a fold over the server
//! event stream. Because every pin event carries the full post-merge entity,
//! the fold is idempotent and order-independent across observers: folding
//! the same `pin_updated` twice, or two updates in either order, converges
//! on the authoritative value.
//!
//! The one speculative path is drag prediction: `predict_move` mutates the
//! local pin immediately and hands back the command to transmit. The echoed
//! `pin_updated` later folds over the guess with an unconditional overwrite —
//! never a diff or merge — so the view self-corrects on confirmation.

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::{ClientCommand, ServerEvent};
use crate::state::{Participant, Pin};

/// Local copy of one room's state, folded from the event stream.
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    /// Own identity, learned from `init`.
    pub me: Option<Participant>,
    pub pins: HashMap<Uuid, Pin>,
    /// Other participants. Never contains `me`.
    pub users: HashMap<Uuid, Participant>,
    /// Advisory edit locks: pin ID -> participant editing it.
    pub editing: HashMap<Uuid, Uuid>,
}

impl ClientView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the view.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Init { user, pins, users } => {
                self.me = Some(user);
                self.pins = pins.into_iter().map(|pin| (pin.id, pin)).collect();
                self.users = users.into_iter().map(|user| (user.id, user)).collect();
                self.editing.clear();
            }
            ServerEvent::PinCreated { pin } | ServerEvent::PinUpdated { pin } => {
                self.pins.insert(pin.id, pin);
            }
            ServerEvent::PinDeleted { pin_id } => {
                self.pins.remove(&pin_id);
                self.editing.remove(&pin_id);
            }
            ServerEvent::UserJoined { user } => {
                self.users.insert(user.id, user);
            }
            ServerEvent::UserLeft { user_id } => {
                self.users.remove(&user_id);
                self.editing.retain(|_, editor| *editor != user_id);
            }
            ServerEvent::CursorMoved { user_id, cursor } => {
                if let Some(user) = self.users.get_mut(&user_id) {
                    user.cursor = Some(cursor);
                }
            }
            ServerEvent::EditStarted { pin_id, user_id } => {
                self.editing.insert(pin_id, user_id);
            }
            // Validation errors belong to the transport layer, not the view.
            ServerEvent::Error { .. } => {}
        }
    }

    /// Optimistic drag: move the local pin now and return the `pin_update`
    /// command to send. Returns `None` for an unknown pin (nothing to drag,
    /// nothing to send). Only drags are predicted; create, delete, and cursor
    /// effects become visible on event arrival.
    pub fn predict_move(&mut self, pin_id: Uuid, x: f64, y: f64) -> Option<ClientCommand> {
        let pin = self.pins.get_mut(&pin_id)?;
        pin.x = x;
        pin.y = y;
        Some(ClientCommand::PinUpdate { id: pin_id, x: Some(x), y: Some(y), text: None })
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;
