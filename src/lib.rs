//! Pinboard — real-time shared pinboard synchronization engine.
//!
//! One room per collaborative session: participants create, move, and edit
//! pins over a WebSocket, and every committed mutation is fanned out as an
//! authoritative event. Rooms are purely in-memory and live only while
//! participants are attached.

pub mod protocol;
pub mod reconciler;
pub mod routes;
pub mod services;
pub mod state;
