//! Integration-style client tests for the Wordcraft client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! messages and verify that `LobbyClient` keeps its projection, countdown and
//! reconnection credential in step with them.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_test::assert_ok;
use wordcraft_client::{
    ClientMessage, ClockOffset, DisconnectReason, Effect, GamePhase, LobbyClient, LobbyConfig,
    LobbyEvent, Projection, ReconnectionCoordinator, WordcraftError,
};

use common::{
    client, client_joined_json, client_left_json, clients_turn_json, game_over_json,
    in_progress_snapshot, next_event, script, shutdown_json, snapshot_json, turn_expired_json,
    wait_for, waiting_snapshot, FixedTimeSource, GatedTimeSource, ManualClock, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

struct Harness {
    client: LobbyClient,
    events: mpsc::Receiver<LobbyEvent>,
    sent: Arc<std::sync::Mutex<Vec<String>>>,
    closed: Arc<std::sync::atomic::AtomicBool>,
    coordinator: Arc<ReconnectionCoordinator>,
}

fn config() -> LobbyConfig {
    LobbyConfig::new(uuid::Uuid::nil()).with_clock(ManualClock::at(0))
}

fn start_with(
    transport: MockTransport,
    closed: Arc<std::sync::atomic::AtomicBool>,
    sent: Arc<std::sync::Mutex<Vec<String>>>,
    config: LobbyConfig,
) -> Harness {
    common::init_tracing();
    let coordinator = Arc::new(ReconnectionCoordinator::in_memory());
    let (client, events) = LobbyClient::start(transport, config, Arc::clone(&coordinator));
    Harness {
        client,
        events,
        sent,
        closed,
        coordinator,
    }
}

fn start(incoming: Vec<Option<Result<String, WordcraftError>>>) -> Harness {
    let (transport, sent, closed) = MockTransport::new(incoming);
    start_with(transport, closed, sent, config())
}

async fn expect_connected(rx: &mut mpsc::Receiver<LobbyEvent>) {
    let event = next_event(rx).await;
    assert!(
        matches!(event, LobbyEvent::Connected { .. }),
        "first event should be Connected, got {event:?}"
    );
}

fn sent_messages(sent: &std::sync::Mutex<Vec<String>>) -> Vec<ClientMessage> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|json| serde_json::from_str(json).unwrap())
        .collect()
}

fn two_player_snapshot() -> String {
    snapshot_json(waiting_snapshot(
        1,
        vec![client(1, "ann", true), client(2, "bo", true)],
    ))
}

// ════════════════════════════════════════════════════════════════════
// Snapshot handling
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshot_initializes_projection() {
    let mut h = start(script([two_player_snapshot()]));
    assert!(!h.client.state().is_ready());
    expect_connected(&mut h.events).await;

    let LobbyEvent::Snapshot { state } = next_event(&mut h.events).await else {
        panic!("expected Snapshot");
    };
    assert_eq!(state.my_id, 1);
    assert_eq!(state.phase, GamePhase::Waiting);
    assert_eq!(state.participants.len(), 2);
    assert_eq!(h.client.state(), Projection::Ready(state));

    h.client.shutdown().await;
}

#[tokio::test]
async fn snapshot_credential_is_stored_for_reconnect() {
    let mut h = start(script([two_player_snapshot()]));
    expect_connected(&mut h.events).await;
    let _ = next_event(&mut h.events).await; // Snapshot

    assert_eq!(h.coordinator.credential().as_deref(), Some("token-1"));
    assert!(h
        .coordinator
        .connection_url(&config())
        .ends_with("?reconnectToken=token-1"));

    h.client.shutdown().await;
}

#[tokio::test]
async fn events_before_snapshot_are_dropped() {
    let mut h = start(script([
        client_joined_json(9, "early"),
        clients_turn_json(9, "zz", 5_000),
        two_player_snapshot(),
    ]));
    expect_connected(&mut h.events).await;

    let LobbyEvent::Snapshot { state } = next_event(&mut h.events).await else {
        panic!("expected Snapshot right after Connected");
    };
    assert!(state.participant(9).is_none());
    assert_eq!(state.phase, GamePhase::Waiting);

    h.client.shutdown().await;
}

#[tokio::test]
async fn unknown_and_malformed_messages_are_skipped() {
    let mut h = start(script([
        r#"{"Type":"emoji_reaction","Content":"🎉"}"#.to_string(),
        r#"{"Type":"client_left","Content":{"oops":true}}"#.to_string(),
        "garbage".to_string(),
        two_player_snapshot(),
        client_left_json(2),
    ]));
    expect_connected(&mut h.events).await;

    assert!(matches!(
        next_event(&mut h.events).await,
        LobbyEvent::Snapshot { .. }
    ));
    let LobbyEvent::Updated { kind, state, .. } = next_event(&mut h.events).await else {
        panic!("expected Updated");
    };
    assert_eq!(kind, "client_left");
    assert_eq!(state.participants.len(), 1);
    assert!(h.client.is_connected());

    h.client.shutdown().await;
}

#[tokio::test]
async fn no_op_events_produce_no_update() {
    let mut h = start(script([
        two_player_snapshot(),
        client_joined_json(3, "cy"),
        client_joined_json(3, "cy"),
        client_left_json(42),
        client_left_json(3),
    ]));
    expect_connected(&mut h.events).await;
    let _ = next_event(&mut h.events).await; // Snapshot

    let LobbyEvent::Updated { kind, effects, .. } = next_event(&mut h.events).await else {
        panic!("expected Updated");
    };
    assert_eq!(kind, "client_joined");
    assert_eq!(effects, vec![Effect::PlayJoinSound { participant_id: 3 }]);

    // The duplicate join and the unknown leave are silent.
    let LobbyEvent::Updated { kind, state, .. } = next_event(&mut h.events).await else {
        panic!("expected Updated");
    };
    assert_eq!(kind, "client_left");
    assert!(state.participant(3).is_none());

    h.client.shutdown().await;
}

#[tokio::test]
async fn state_watch_follows_updates() {
    let (transport, sent, closed) = MockTransport::new(vec![]);
    let (transport, feed) = transport.with_feed();
    let mut h = start_with(transport, closed, sent, config());
    let mut watch = h.client.watch_state();
    expect_connected(&mut h.events).await;

    feed.send(Some(Ok(two_player_snapshot()))).unwrap();
    watch.changed().await.unwrap();
    assert!(watch.borrow_and_update().is_ready());

    feed.send(Some(Ok(client_left_json(2)))).unwrap();
    watch.changed().await.unwrap();
    assert_eq!(
        watch.borrow().state().unwrap().participants.len(),
        1,
        "watch should reflect client_left"
    );

    h.client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Countdown
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn countdown_runs_for_snapshot_turn() {
    let clock = ManualClock::at(0);
    let (transport, sent, closed) = MockTransport::new(script([snapshot_json(
        in_progress_snapshot(1, vec![client(1, "ann", true)], 1, "cat", 10_000),
    )]));
    let mut h = start_with(transport, closed, sent, config().with_clock(clock.clone()));
    expect_connected(&mut h.events).await;
    assert!(matches!(
        next_event(&mut h.events).await,
        LobbyEvent::Snapshot { .. }
    ));

    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Countdown {
            seconds_remaining: 10
        }
    );

    clock.set(1_000);
    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Countdown {
            seconds_remaining: 9
        }
    );

    // Past the deadline the countdown rests at zero.
    clock.set(60_000);
    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Countdown {
            seconds_remaining: 0
        }
    );

    h.client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn new_turn_restarts_countdown_and_game_over_stops_it() {
    let clock = ManualClock::at(0);
    let (transport, sent, closed) = MockTransport::new(vec![]);
    let (transport, feed) = transport.with_feed();
    let mut h = start_with(transport, closed, sent, config().with_clock(clock.clone()));
    expect_connected(&mut h.events).await;

    feed.send(Some(Ok(snapshot_json(in_progress_snapshot(
        1,
        vec![client(1, "ann", true), client(2, "bo", true)],
        1,
        "cat",
        10_000,
    )))))
    .unwrap();
    wait_for(&mut h.events, |e| {
        matches!(e, LobbyEvent::Countdown { seconds_remaining: 10 })
    })
    .await;

    feed.send(Some(Ok(turn_expired_json(1, &["scat"])))).unwrap();
    feed.send(Some(Ok(clients_turn_json(2, "og", 30_000)))).unwrap();

    let LobbyEvent::Updated { kind, effects, .. } =
        wait_for(&mut h.events, |e| matches!(e, LobbyEvent::Updated { kind: "clients_turn", .. }))
            .await
    else {
        unreachable!();
    };
    assert_eq!(kind, "clients_turn");
    assert_eq!(effects, vec![Effect::ResetCountdown { deadline: 30_000 }]);
    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Countdown {
            seconds_remaining: 30
        }
    );

    feed.send(Some(Ok(game_over_json(2)))).unwrap();
    let LobbyEvent::Updated { state, effects, .. } = next_event(&mut h.events).await else {
        panic!("expected game_over update");
    };
    assert_eq!(state.phase, GamePhase::Over);
    assert_eq!(state.winner_name.as_deref(), Some("bo"));
    assert_eq!(effects, vec![Effect::StopCountdown]);

    // No further ticks once the game is over.
    clock.set(5_000);
    let quiet = tokio::time::timeout(Duration::from_secs(3), h.events.recv()).await;
    assert!(quiet.is_err(), "unexpected event after game over: {quiet:?}");

    h.client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn turn_without_deadline_stops_the_old_countdown() {
    let clock = ManualClock::at(0);
    let (transport, sent, closed) = MockTransport::new(vec![]);
    let (transport, feed) = transport.with_feed();
    let mut h = start_with(transport, closed, sent, config().with_clock(clock.clone()));
    expect_connected(&mut h.events).await;

    feed.send(Some(Ok(snapshot_json(in_progress_snapshot(
        1,
        vec![client(1, "ann", true), client(2, "bo", true)],
        1,
        "cat",
        10_000,
    )))))
    .unwrap();
    wait_for(&mut h.events, |e| {
        matches!(e, LobbyEvent::Countdown { seconds_remaining: 10 })
    })
    .await;

    feed.send(Some(Ok(
        r#"{"Type":"clients_turn","Content":{"ClientId":2,"Challenge":"og"}}"#.to_string(),
    )))
    .unwrap();
    let LobbyEvent::Updated {
        kind,
        state,
        effects,
    } = next_event(&mut h.events).await
    else {
        panic!("expected clients_turn update");
    };
    assert_eq!(kind, "clients_turn");
    assert_eq!(state.turn.owner_id, Some(2));
    assert_eq!(state.turn.challenge, "og");
    assert_eq!(state.turn.deadline, None);
    assert!(effects.is_empty());
    assert_eq!(h.client.state().state().unwrap().turn.owner_id, Some(2));

    clock.set(5_000);
    let quiet = tokio::time::timeout(Duration::from_secs(3), h.events.recv()).await;
    assert!(quiet.is_err(), "countdown kept running: {quiet:?}");

    h.client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Clock probe
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn probe_result_is_reported() {
    let (transport, sent, closed) = MockTransport::new(vec![]);
    let config = config()
        .with_clock(ManualClock::at(1_000))
        .with_time_source(FixedTimeSource(1_500));
    let mut h = start_with(transport, closed, sent, config);
    expect_connected(&mut h.events).await;

    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::ClockSynchronized {
            offset: ClockOffset { offset_millis: 500 },
            round_trip_ms: 0,
        }
    );

    h.client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn probe_for_superseded_connection_is_discarded() {
    let (source, release) = GatedTimeSource::new();
    let (transport, sent, closed) = MockTransport::new(vec![]);
    let mut h = start_with(
        transport,
        closed,
        sent,
        config().with_time_source(source),
    );
    expect_connected(&mut h.events).await;

    // A newer connection begins while the first probe is still in flight.
    let newer = h.coordinator.begin_connection();
    assert!(newer > h.client.generation());
    release.send(1_500).unwrap();

    let quiet = tokio::time::timeout(Duration::from_secs(2), h.events.recv()).await;
    assert!(quiet.is_err(), "stale probe was applied: {quiet:?}");

    h.client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Disconnects
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn connection_loss_is_recoverable_and_resets_state() {
    let mut incoming = script([two_player_snapshot()]);
    incoming.push(None);
    let mut h = start(incoming);
    expect_connected(&mut h.events).await;
    let _ = next_event(&mut h.events).await; // Snapshot

    let LobbyEvent::Disconnected { reason } = next_event(&mut h.events).await else {
        panic!("expected Disconnected");
    };
    assert_eq!(reason, DisconnectReason::ConnectionLost { detail: None });
    assert!(reason.is_recoverable());
    assert!(!h.client.is_connected());
    assert_eq!(h.client.state(), Projection::Uninitialized);
    assert_eq!(h.coordinator.credential().as_deref(), Some("token-1"));
    assert!(matches!(
        h.client.start_game(),
        Err(WordcraftError::NotConnected)
    ));
}

#[tokio::test]
async fn receive_error_reports_detail() {
    let h = start(vec![Some(Err(WordcraftError::TransportReceive(
        "reset by peer".into(),
    )))]);
    let mut events = h.events;
    expect_connected(&mut events).await;

    let LobbyEvent::Disconnected {
        reason: DisconnectReason::ConnectionLost { detail: Some(detail) },
    } = next_event(&mut events).await
    else {
        panic!("expected ConnectionLost with detail");
    };
    assert!(detail.contains("reset by peer"));
}

#[tokio::test]
async fn server_shutdown_is_terminal() {
    let mut h = start(script([two_player_snapshot(), shutdown_json()]));
    expect_connected(&mut h.events).await;
    let _ = next_event(&mut h.events).await; // Snapshot

    let LobbyEvent::Updated { kind, effects, .. } = next_event(&mut h.events).await else {
        panic!("expected shutdown update");
    };
    assert_eq!(kind, "shutdown");
    assert_eq!(effects, vec![Effect::NotifyShutdown]);

    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Disconnected {
            reason: DisconnectReason::ServerShutdown
        }
    );
    assert!(h.events.recv().await.is_none());
    assert!(h.closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(h.coordinator.credential().is_none());
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn shutdown_before_snapshot_still_ends_the_session() {
    let mut h = start(script([shutdown_json()]));
    expect_connected(&mut h.events).await;
    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Disconnected {
            reason: DisconnectReason::ServerShutdown
        }
    );
}

#[tokio::test]
async fn client_shutdown_closes_transport() {
    let mut h = start(vec![]);
    expect_connected(&mut h.events).await;

    h.client.shutdown().await;
    assert!(h.closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(!h.client.is_connected());
    assert_eq!(
        next_event(&mut h.events).await,
        LobbyEvent::Disconnected {
            reason: DisconnectReason::ClientShutdown
        }
    );
}

// ════════════════════════════════════════════════════════════════════
// Outbound intents
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn intents_are_sent_in_order() {
    let mut h = start(vec![]);
    expect_connected(&mut h.events).await;

    assert_ok!(h.client.start_game());
    assert_ok!(h.client.send_answer_preview("CATE"));
    assert_ok!(h.client.submit_answer("Cater"));
    assert_ok!(h.client.change_name(" bo "));
    assert_ok!(h.client.restart_game());
    assert_ok!(h.client.request_details());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        sent_messages(&h.sent),
        vec![
            ClientMessage::StartGame,
            ClientMessage::AnswerPreview("cate".into()),
            ClientMessage::SubmitAnswer("Cater".into()),
            ClientMessage::NameChange("bo".into()),
            ClientMessage::RestartGame,
            ClientMessage::ClientDetailsReq,
        ]
    );

    h.client.shutdown().await;
}

#[tokio::test]
async fn intents_do_not_touch_the_projection() {
    let mut h = start(script([two_player_snapshot()]));
    expect_connected(&mut h.events).await;
    let _ = next_event(&mut h.events).await; // Snapshot
    let before = h.client.state();

    assert_ok!(h.client.start_game());
    assert_ok!(h.client.change_name("renamed"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.client.state(), before);
    h.client.shutdown().await;
}

#[tokio::test]
async fn overlong_name_is_rejected_locally() {
    let mut h = start(vec![]);
    expect_connected(&mut h.events).await;

    let err = h.client.change_name("sixteen-chars-xx").unwrap_err();
    assert!(matches!(
        err,
        WordcraftError::InvalidDisplayName { len: 16, max: 15 }
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.sent.lock().unwrap().is_empty());

    h.client.shutdown().await;
}
