//! Room membership and lifecycle
//!
//! Seat capacity, role uniqueness, rejoin after disconnect, and teardown on
//! last-human departure, exercised through the public store interface.

use std::time::Duration;
use tokio::sync::broadcast;

use temcrew::agent::{AgentModels, AgentPacing};
use temcrew::game::GameError;
use temcrew::gateway::messages::{Outbound, ServerMessage};
use temcrew::llm::NullModel;
use temcrew::rooms::{RoomCommand, RoomStore};
use temcrew::types::{GameMode, Role, SessionId};

fn models() -> AgentModels {
    AgentModels {
        fast: std::sync::Arc::new(NullModel),
        slow: std::sync::Arc::new(NullModel),
        pacing: AgentPacing::instant(),
    }
}

async fn expect_message(
    events: &mut broadcast::Receiver<Outbound>,
    what: &str,
    mut pred: impl FnMut(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let outbound = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
            .unwrap_or_else(|e| panic!("broadcast closed waiting for {}: {}", what, e));
        if pred(&outbound.message) {
            return outbound.message;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_seat_cap_and_role_uniqueness() {
    let dir = tempfile::tempdir().unwrap();
    let store = RoomStore::new(dir.path(), models());

    store
        .join("caproom", SessionId::new_v4(), "alice", Role::Pf, GameMode::DualPlayer)
        .await
        .unwrap();

    // Same role again: rejected, seat intact.
    let err = store
        .join("caproom", SessionId::new_v4(), "mallory", Role::Pf, GameMode::DualPlayer)
        .await
        .unwrap_err();
    assert_eq!(err, GameError::SeatTaken(Role::Pf));

    store
        .join("caproom", SessionId::new_v4(), "bob", Role::Pm, GameMode::DualPlayer)
        .await
        .unwrap();

    // Third occupant: room full, reported to the requester only.
    let err = store
        .join("caproom", SessionId::new_v4(), "carol", Role::Pm, GameMode::DualPlayer)
        .await
        .unwrap_err();
    assert_eq!(err, GameError::RoomFull);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_frees_the_seat_for_the_same_role() {
    let dir = tempfile::tempdir().unwrap();
    let store = RoomStore::new(dir.path(), models());

    let alice = SessionId::new_v4();
    let (handle, _events) = store
        .join("rejoin", alice, "alice", Role::Pf, GameMode::DualPlayer)
        .await
        .unwrap();
    let (_, mut bob_events) = store
        .join("rejoin", SessionId::new_v4(), "bob", Role::Pm, GameMode::DualPlayer)
        .await
        .unwrap();

    handle
        .commands
        .send(RoomCommand::Leave { session: alice })
        .await
        .unwrap();

    let left = expect_message(&mut bob_events, "user_left", |m| {
        matches!(m, ServerMessage::UserLeft { .. })
    })
    .await;
    if let ServerMessage::UserLeft {
        username,
        role,
        remaining_count,
    } = left
    {
        assert_eq!(username, "alice");
        assert_eq!(role, Role::Pf);
        assert_eq!(remaining_count, 1);
    }

    // The PF seat is free again for a new occupant.
    store
        .join("rejoin", SessionId::new_v4(), "carol", Role::Pf, GameMode::DualPlayer)
        .await
        .unwrap();
    let update = expect_message(&mut bob_events, "user_count_update", |m| {
        matches!(m, ServerMessage::UserCountUpdate { count: 2, .. })
    })
    .await;
    if let ServerMessage::UserCountUpdate { usernames, .. } = update {
        assert!(usernames.contains(&"carol".to_string()));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_last_human_departure_tears_the_room_down() {
    let dir = tempfile::tempdir().unwrap();
    let store = RoomStore::new(dir.path(), models());

    let alice = SessionId::new_v4();
    // Single-player: the AI partner is seated too, but it cannot hold the
    // room open by itself.
    let (handle, _events) = store
        .join("ephemeral", alice, "alice", Role::Pf, GameMode::SinglePlayer)
        .await
        .unwrap();
    assert_eq!(store.room_count(), 1);

    handle
        .commands
        .send(RoomCommand::Leave { session: alice })
        .await
        .unwrap();

    // The actor exits and removes itself from the store.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.get("ephemeral").is_some() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "room was not torn down"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.room_count(), 0);

    // A fresh join for the same id builds a brand-new session.
    let (_, mut events) = store
        .join("ephemeral", SessionId::new_v4(), "dave", Role::Pm, GameMode::DualPlayer)
        .await
        .unwrap();
    let update = expect_message(&mut events, "fresh room join", |m| {
        matches!(m, ServerMessage::UserCountUpdate { count: 1, .. })
    })
    .await;
    assert!(matches!(update, ServerMessage::UserCountUpdate { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_all_cancels_live_rooms() {
    let dir = tempfile::tempdir().unwrap();
    let store = RoomStore::new(dir.path(), models());

    store
        .join("alpha", SessionId::new_v4(), "alice", Role::Pf, GameMode::DualPlayer)
        .await
        .unwrap();
    store
        .join("bravo", SessionId::new_v4(), "bob", Role::Pm, GameMode::DualPlayer)
        .await
        .unwrap();
    assert_eq!(store.room_count(), 2);

    // Both actors stop at their next suspension point and deregister.
    store.shutdown_all();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.room_count() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "rooms survived cancellation"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_log_survives_room_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let store = RoomStore::new(dir.path(), models());

    let alice = SessionId::new_v4();
    let (handle, _events) = store
        .join("keeper", alice, "alice", Role::Pf, GameMode::DualPlayer)
        .await
        .unwrap();
    handle
        .commands
        .send(RoomCommand::Leave { session: alice })
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.get("keeper").is_some() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The room is gone; its log remains on disk with the lifecycle records.
    let log_path = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().contains("keeper"))
        })
        .expect("session log kept after teardown");
    let raw = std::fs::read_to_string(log_path).unwrap();
    assert!(raw.contains("session_created"));
    assert!(raw.contains("user_joined"));
    assert!(raw.contains("user_left"));
}
