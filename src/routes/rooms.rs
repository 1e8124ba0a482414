//! REST endpoints — out-of-band room creation and active-user listing.
//!
//! Room creation happens before the creator's stream attaches: the response
//! hands back the fresh room ID plus a minted participant ID the creator
//! presents when connecting.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::services;
use crate::state::{AppState, Participant};

// =============================================================================
// CREATE ROOM
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Json<CreateRoomResponse> {
    let username = req
        .username
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(random_username);

    // The participant ID is reserved inside the room; the creator claims it
    // by presenting it on the WebSocket attach.
    let (room_id, user_id) = services::room::create_room(&state).await;

    info!(%room_id, %user_id, username, "room created via rest");
    Json(CreateRoomResponse { room_id, user_id, username })
}

fn random_username() -> String {
    let mut rng = rand::rng();
    format!("User-{}", rng.random_range(1000..=9999))
}

// =============================================================================
// LIST USERS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RoomUsersResponse {
    pub room_id: Uuid,
    pub users: Vec<Participant>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomUsersResponse>, (StatusCode, String)> {
    match services::room::list_room_users(&state, room_id).await {
        Ok(users) => Ok(Json(RoomUsersResponse { room_id, users })),
        Err(e) => Err((StatusCode::NOT_FOUND, e.to_string())),
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
