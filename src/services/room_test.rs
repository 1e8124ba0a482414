use super::*;
use crate::state::test_helpers;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

async fn recv_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("broadcast receive timed out")
        .expect("broadcast channel closed unexpectedly")
}

async fn assert_no_event(rx: &mut mpsc::Receiver<ServerEvent>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no broadcast event"
    );
}

#[tokio::test]
async fn create_room_registers_empty_room_with_reservation() {
    let state = AppState::new();
    let (room_id, user_id) = create_room(&state).await;

    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).expect("room should exist");
    assert!(room.pins.is_empty());
    assert!(room.users.is_empty());
    assert!(room.reserved.contains(&user_id));
}

#[tokio::test]
async fn join_room_snapshot_excludes_joiner() {
    let state = AppState::new();
    let pin = test_helpers::dummy_pin();
    let pin_id = pin.id;
    let room_id = test_helpers::seed_room_with_pins(&state, vec![pin]).await;

    let alice = test_helpers::dummy_participant("alice");
    let alice_id = alice.id;
    let _alice_rx = test_helpers::register_client(&state, room_id, alice).await;

    let (tx, _rx) = mpsc::channel(8);
    let (bob, snapshot) = join_room(&state, room_id, None, "bob".into(), "#fff".into(), tx)
        .await
        .unwrap();
    let bob_id = bob.id;

    assert_eq!(snapshot.pins.len(), 1);
    assert_eq!(snapshot.pins[0].id, pin_id);
    assert_eq!(snapshot.users.len(), 1);
    assert_eq!(snapshot.users[0].id, alice_id);

    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).unwrap();
    assert!(room.users.contains_key(&bob_id));
    assert!(room.clients.contains_key(&bob_id));
}

#[tokio::test]
async fn join_unknown_room_fails_not_found() {
    let state = AppState::new();
    let (tx, _rx) = mpsc::channel(8);
    let result = join_room(&state, Uuid::new_v4(), None, "ghost".into(), "#fff".into(), tx).await;
    assert!(matches!(result.unwrap_err(), RoomError::NotFound(_)));
}

#[tokio::test]
async fn join_never_creates_a_room_implicitly() {
    let state = AppState::new();
    let room_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let _ = join_room(&state, room_id, None, "ghost".into(), "#fff".into(), tx).await;

    let rooms = state.rooms.read().await;
    assert!(!rooms.contains_key(&room_id));
}

#[tokio::test]
async fn join_claims_reservation_exactly_once() {
    let state = AppState::new();
    let (room_id, reserved) = create_room(&state).await;

    let (tx, _rx) = mpsc::channel(8);
    let (creator, _) = join_room(&state, room_id, Some(reserved), "alice".into(), "#fff".into(), tx)
        .await
        .unwrap();
    assert_eq!(creator.id, reserved);

    // The reservation is consumed: presenting it again gets a fresh mint.
    let (tx, _rx2) = mpsc::channel(8);
    let (imposter, _) = join_room(&state, room_id, Some(reserved), "mallory".into(), "#fff".into(), tx)
        .await
        .unwrap();
    assert_ne!(imposter.id, reserved);
}

#[tokio::test]
async fn join_mints_fresh_id_for_unreserved_identity() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;

    // A client-forged id is never adopted.
    let forged = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let (joined, _) = join_room(&state, room_id, Some(forged), "mallory".into(), "#fff".into(), tx)
        .await
        .unwrap();
    assert_ne!(joined.id, forged);

    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).unwrap();
    assert!(!room.users.contains_key(&forged));
    assert!(room.users.contains_key(&joined.id));
}

#[tokio::test]
async fn part_room_keeps_leavers_pins_and_releases_locks() {
    let state = AppState::new();
    let alice = test_helpers::dummy_participant("alice");
    let alice_id = alice.id;
    let mut pin = test_helpers::dummy_pin();
    pin.created_by = alice_id;
    let pin_id = pin.id;

    let room_id = test_helpers::seed_room_with_pins(&state, vec![pin]).await;
    let _alice_rx = test_helpers::register_client(&state, room_id, alice).await;
    let _bob_rx = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("bob")).await;
    {
        let mut rooms = state.rooms.write().await;
        rooms
            .get_mut(&room_id)
            .unwrap()
            .active_edits
            .insert(pin_id, alice_id);
    }

    part_room(&state, room_id, alice_id).await;

    let rooms = state.rooms.read().await;
    let room = rooms.get(&room_id).expect("room should survive while bob remains");
    assert!(!room.users.contains_key(&alice_id));
    assert!(!room.clients.contains_key(&alice_id));
    assert!(room.active_edits.is_empty());
    // Pins are owned by the room, not the creator's connection.
    assert!(room.pins.contains_key(&pin_id));
}

#[tokio::test]
async fn last_part_evicts_room_and_rejoin_fails() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;
    let alice = test_helpers::dummy_participant("alice");
    let alice_id = alice.id;
    let _rx = test_helpers::register_client(&state, room_id, alice).await;

    part_room(&state, room_id, alice_id).await;

    {
        let rooms = state.rooms.read().await;
        assert!(!rooms.contains_key(&room_id));
    }

    // A released room has no way to regain participants.
    let (tx, _rx) = mpsc::channel(8);
    let result = join_room(&state, room_id, None, "late".into(), "#fff".into(), tx).await;
    assert!(matches!(result.unwrap_err(), RoomError::NotFound(_)));
}

#[tokio::test]
async fn sweep_evicts_unclaimed_rooms() {
    let state = AppState::new();
    let (room_id, _) = create_room(&state).await;

    assert_eq!(evict_stale_rooms(&state, Duration::ZERO).await, 1);

    let rooms = state.rooms.read().await;
    assert!(!rooms.contains_key(&room_id));
}

#[tokio::test]
async fn sweep_spares_attached_and_fresh_rooms() {
    let state = AppState::new();
    let attached = test_helpers::seed_room(&state).await;
    let _rx = test_helpers::register_client(&state, attached, test_helpers::dummy_participant("alice")).await;
    let (fresh, _) = create_room(&state).await;

    // An attached room is never swept, a fresh unclaimed one only after TTL.
    assert_eq!(evict_stale_rooms(&state, Duration::from_secs(3600)).await, 0);
    assert_eq!(evict_stale_rooms(&state, Duration::ZERO).await, 1);

    let rooms = state.rooms.read().await;
    assert!(rooms.contains_key(&attached));
    assert!(!rooms.contains_key(&fresh));
}

#[tokio::test]
async fn part_unknown_room_is_a_no_op() {
    let state = AppState::new();
    part_room(&state, Uuid::new_v4(), Uuid::new_v4()).await;
}

#[tokio::test]
async fn move_cursor_sets_participant_cursor() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;
    let alice = test_helpers::dummy_participant("alice");
    let alice_id = alice.id;
    let _rx = test_helpers::register_client(&state, room_id, alice).await;

    assert!(move_cursor(&state, room_id, alice_id, Cursor { x: 10.0, y: 20.0 }).await);

    let rooms = state.rooms.read().await;
    let user = rooms.get(&room_id).unwrap().users.get(&alice_id).unwrap();
    assert_eq!(user.cursor, Some(Cursor { x: 10.0, y: 20.0 }));
}

#[tokio::test]
async fn move_cursor_unknown_participant_is_false() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;
    assert!(!move_cursor(&state, room_id, Uuid::new_v4(), Cursor { x: 0.0, y: 0.0 }).await);
}

#[tokio::test]
async fn list_room_users_returns_participants() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;
    let _a = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("alice")).await;
    let _b = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("bob")).await;

    let users = list_room_users(&state, room_id).await.unwrap();
    assert_eq!(users.len(), 2);

    let result = list_room_users(&state, Uuid::new_v4()).await;
    assert!(matches!(result.unwrap_err(), RoomError::NotFound(_)));
}

#[tokio::test]
async fn broadcast_reaches_all_clients() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;
    let mut rx_a = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("alice")).await;
    let mut rx_b = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("bob")).await;

    let event = ServerEvent::PinDeleted { pin_id: Uuid::new_v4() };
    broadcast(&state, room_id, &event, None).await;

    assert_eq!(recv_event(&mut rx_a).await, event);
    assert_eq!(recv_event(&mut rx_b).await, event);
}

#[tokio::test]
async fn broadcast_can_exclude_originator() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;
    let alice = test_helpers::dummy_participant("alice");
    let alice_id = alice.id;
    let mut rx_a = test_helpers::register_client(&state, room_id, alice).await;
    let mut rx_b = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("bob")).await;

    let event = ServerEvent::CursorMoved { user_id: alice_id, cursor: Cursor { x: 1.0, y: 2.0 } };
    broadcast(&state, room_id, &event, Some(alice_id)).await;

    assert_eq!(recv_event(&mut rx_b).await, event);
    assert_no_event(&mut rx_a).await;
}

#[tokio::test]
async fn broadcast_to_missing_room_is_a_no_op() {
    let state = AppState::new();
    broadcast(&state, Uuid::new_v4(), &ServerEvent::UserLeft { user_id: Uuid::new_v4() }, None).await;
}

#[tokio::test]
async fn broadcast_skips_full_channel_without_stalling() {
    let state = AppState::new();
    let room_id = test_helpers::seed_room(&state).await;

    // A one-slot channel that is already full simulates a stalled reader.
    let stalled = test_helpers::dummy_participant("stalled");
    let (tx, _stalled_rx) = mpsc::channel(1);
    tx.try_send(ServerEvent::UserLeft { user_id: Uuid::new_v4() }).unwrap();
    {
        let mut rooms = state.rooms.write().await;
        let room = rooms.get_mut(&room_id).unwrap();
        room.clients.insert(stalled.id, tx);
        room.users.insert(stalled.id, stalled);
    }
    let mut rx_b = test_helpers::register_client(&state, room_id, test_helpers::dummy_participant("bob")).await;

    let event = ServerEvent::PinDeleted { pin_id: Uuid::new_v4() };
    broadcast(&state, room_id, &event, None).await;

    // The healthy peer still gets the event.
    assert_eq!(recv_event(&mut rx_b).await, event);
}
