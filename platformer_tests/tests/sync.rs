//! Game state sync over a real socket: snapshots, publishing, level
//! advances and the leaderboard.

use std::time::{Duration, Instant};

use platformer_client::coordinator::TransitionOutcome;
use platformer_client::input::InputState;
use platformer_client::session::ConnectionState;
use platformer_client::GameClient;
use platformer_shared::config::ClientConfig;
use platformer_shared::level::LEVEL_COMPLETE_BONUS;
use platformer_shared::net::events;
use platformer_tests::{init_tracing, wait_until, MockServer};
use serde_json::json;

const WAIT: Duration = Duration::from_secs(5);

fn connected_client(server: &MockServer) -> anyhow::Result<GameClient> {
    let cfg = ClientConfig {
        server_addr: server.addr(),
        player_name: "tester".into(),
        reconnect_delay_ms: 50,
        ..Default::default()
    };
    let mut client = GameClient::new(cfg)?;
    client.start()?;
    anyhow::ensure!(
        wait_until(WAIT, || client.local_id().is_some()),
        "client never received an identity"
    );
    Ok(client)
}

/// Runs frames at roughly 60 Hz until `cond` holds or `timeout` passes.
fn run_frames_until(
    client: &mut GameClient,
    timeout: Duration,
    mut cond: impl FnMut(&GameClient) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        client.frame(InputState::default(), Instant::now());
        if cond(client) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    false
}

#[test]
fn snapshot_excludes_self_and_tracks_membership() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let client = connected_client(&server)?;
    let me = client.local_id().unwrap_or_default();

    let mut snapshot = json!({
        "alice": {"x": 100, "y": 200, "username": "alice", "score": 300},
        "bob": {"x": 400, "y": 500}
    });
    snapshot[me.as_str()] = json!({"x": 1, "y": 1, "username": "tester", "score": 0});
    server.broadcast(events::PLAYER_UPDATE, snapshot);
    assert!(wait_until(WAIT, || client.remote_entities().len() == 2));
    let ids: Vec<_> = client.remote_entities().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["alice".to_string(), "bob".to_string()]);

    server.broadcast(events::PLAYER_UPDATE, json!({"bob": {"x": 410, "y": 500}}));
    assert!(wait_until(WAIT, || client.remote_entities().len() == 1));
    let bob = &client.remote_entities()[0];
    assert_eq!(bob.id, "bob");
    assert_eq!((bob.target.x, bob.target.y), (410.0, 500.0));
    Ok(())
}

#[test]
fn remote_players_ease_toward_reports() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let mut client = connected_client(&server)?;

    server.broadcast(events::PLAYER_UPDATE, json!({"alice": {"x": 0, "y": 0}}));
    assert!(wait_until(WAIT, || client.remote_entities().len() == 1));
    server.broadcast(events::PLAYER_UPDATE, json!({"alice": {"x": 100, "y": 0}}));
    assert!(wait_until(WAIT, || client.remote_entities()[0].target.x == 100.0));

    client.frame(InputState::default(), Instant::now());
    let first = client.remote_entities()[0].current.x;
    assert!(first > 0.0 && first < 100.0, "first = {first}");

    assert!(run_frames_until(&mut client, WAIT, |c| {
        (100.0 - c.remote_entities()[0].current.x) < 0.5
    }));
    Ok(())
}

#[test]
fn published_updates_are_throttled() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let mut client = connected_client(&server)?;

    let start = Instant::now();
    for _ in 0..60 {
        client.frame(InputState::default(), Instant::now());
        std::thread::sleep(Duration::from_millis(16));
    }
    let elapsed = start.elapsed();

    assert!(wait_until(WAIT, || !server.received_events(events::PLAYER_UPDATE).is_empty()));
    std::thread::sleep(Duration::from_millis(100));
    let updates = server.received_events(events::PLAYER_UPDATE);
    let ceiling = (elapsed.as_millis() / 50) as usize + 1;
    assert!(
        updates.len() <= ceiling,
        "{} updates in {elapsed:?}",
        updates.len()
    );

    let payload = &updates[0].envelope.data;
    assert_eq!(payload["username"], "tester");
    assert_eq!(payload["score"], 0);
    assert!(payload["x"].is_number() && payload["y"].is_number());
    Ok(())
}

#[test]
fn remote_advance_moves_the_level_without_republishing() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let mut client = connected_client(&server)?;

    server.broadcast(events::ADVANCE_LEVEL, json!({"level": 1}));
    assert!(run_frames_until(&mut client, WAIT, |c| c.current_level_index() == Some(1)));
    assert_eq!(client.player().score, LEVEL_COMPLETE_BONUS);

    // Untargeted advances from the server also count.
    server.broadcast(events::ADVANCE_LEVEL, serde_json::Value::Null);
    assert!(run_frames_until(&mut client, WAIT, |c| c.current_level_index() == Some(2)));

    std::thread::sleep(Duration::from_millis(100));
    assert!(server.received_events(events::ADVANCE_LEVEL).is_empty());
    Ok(())
}

#[test]
fn local_advance_is_published_and_echo_ignored() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let mut client = connected_client(&server)?;
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    let outcome = client.trigger_local_advance(Instant::now());
    assert_eq!(outcome, TransitionOutcome::Advanced { from: 0, to: 1 });
    assert!(wait_until(WAIT, || server.received_events(events::ADVANCE_LEVEL).len() == 1));
    let sent = &server.received_events(events::ADVANCE_LEVEL)[0];
    assert_eq!(sent.envelope.data, json!({"level": 1}));

    // The server relays it to everyone, including the sender.
    server.broadcast(events::ADVANCE_LEVEL, sent.envelope.data.clone());
    run_frames_until(&mut client, Duration::from_millis(300), |_| false);
    assert_eq!(client.current_level_index(), Some(1));
    assert_eq!(client.player().score, LEVEL_COMPLETE_BONUS);
    Ok(())
}

#[test]
fn leaderboard_is_replaced_wholesale() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let client = connected_client(&server)?;

    server.broadcast(
        events::LEADERBOARD_UPDATE,
        json!([
            {"username": "alice", "score": 300},
            {"name": "bob", "score": 200},
            {"bogus": true}
        ]),
    );
    assert!(wait_until(WAIT, || client.leaderboard().len() == 2));
    let board = client.leaderboard();
    assert_eq!(board.entries()[0].name, "alice");
    assert_eq!(board.entries()[1].name, "bob");

    server.broadcast(events::LEADERBOARD_UPDATE, json!([{"username": "carol", "score": 5}]));
    assert!(wait_until(WAIT, || {
        let board = client.leaderboard();
        board.len() == 1 && board.entries()[0].name == "carol"
    }));
    Ok(())
}

#[test]
fn malformed_messages_do_not_break_the_session() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start()?;
    let client = connected_client(&server)?;

    server.broadcast(events::PLAYER_UPDATE, json!("garbage"));
    server.broadcast(events::LEADERBOARD_UPDATE, json!({"not": "a list"}));
    server.broadcast("unknown_event", json!({}));
    server.broadcast(events::PLAYER_UPDATE, json!({"alice": {"x": 1, "y": 2}}));

    assert!(wait_until(WAIT, || client.remote_entities().len() == 1));
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    assert_eq!(server.connection_count(), 1);
    Ok(())
}
