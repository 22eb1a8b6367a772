//! Integration-style client tests for the Playbook Client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! frames and verify that `PlaybookClient` processes them correctly,
//! including session transitions, outbound frame generation, and event
//! delivery.

mod common;

use std::time::Duration;

use playbook_client::{
    Board, GameEvent, GameStatus, PlaybookClient, PlaybookConfig, PlaybookError, Player,
    SessionPhase,
};

use common::{
    complete_json, init_json, init_json_with, leave_json, reset_json, snapshot, state_json,
    MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helper: start a mock client with scripted frames
// ════════════════════════════════════════════════════════════════════

/// Start a client with the given scripted server frames. The first item
/// is typically `init_json()` so the seating handshake succeeds.
#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, PlaybookError>>>,
) -> (
    PlaybookClient,
    tokio::sync::mpsc::Receiver<GameEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let config = PlaybookConfig::new("ws://test.invalid/playbook");
    let (client, events) = PlaybookClient::start(transport, config);
    (client, events, sent, closed)
}

/// Consume events up to and including the seat assignment sequence
/// (`Connected`, initial status, `Joined`, board snapshot, turn status).
/// Returns the seat's client id and symbol. Panics if the opening
/// sequence deviates.
async fn drain_until_seated(
    rx: &mut tokio::sync::mpsc::Receiver<GameEvent>,
) -> (String, Player) {
    let ev = rx.recv().await.expect("expected Connected event");
    assert!(
        matches!(ev, GameEvent::Connected),
        "first event should be Connected, got {ev:?}"
    );
    let ev = rx.recv().await.expect("expected initial status event");
    assert!(
        matches!(ev, GameEvent::StatusChanged(GameStatus::Initializing)),
        "second event should be the Initializing status, got {ev:?}"
    );
    let ev = rx.recv().await.expect("expected Joined event");
    let seat = match ev {
        GameEvent::Joined { client_id, player } => (client_id, player),
        other => panic!("expected Joined, got {other:?}"),
    };
    let ev = rx.recv().await.expect("expected board snapshot event");
    assert!(
        matches!(ev, GameEvent::BoardUpdated { .. }),
        "expected BoardUpdated after Joined, got {ev:?}"
    );
    let ev = rx.recv().await.expect("expected turn status event");
    assert!(
        matches!(ev, GameEvent::StatusChanged(GameStatus::Turn { .. })),
        "expected a turn status after seating, got {ev:?}"
    );
    seat
}

// ════════════════════════════════════════════════════════════════════
// Seating flow
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn seating_flow_connected_then_seated() {
    let (mut client, mut events, sent, _closed) = start_client(vec![Some(Ok(init_json()))]);

    // First two events are synthetic: the link is up, no seat yet.
    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GameEvent::Connected));
    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::StatusChanged(GameStatus::Initializing));

    // Then the INIT frame lands.
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::Joined {
            client_id: "seat-1".to_owned(),
            player: Player::X,
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: Board::empty(),
            win_line: None,
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::StatusChanged(GameStatus::Turn {
            current: Player::X,
            you: Some(Player::X),
        })
    );

    assert!(client.is_connected());
    assert!(client.is_game_active(), "X opens on an empty board");

    // Verify the join hello went out first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*sent.lock().unwrap(), vec!["play".to_owned()]);

    assert_eq!(client.client_id().await.as_deref(), Some("seat-1"));
    assert_eq!(client.local_player().await, Some(Player::X));
    assert_eq!(client.phase().await, SessionPhase::Active);

    client.shutdown().await;
}

#[tokio::test]
async fn seating_mid_game_hands_the_turn_to_the_right_seat() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![Some(Ok(init_json_with(
        "seat-9",
        Player::O,
        "X........",
    )))]);

    let (client_id, player) = drain_until_seated(&mut events).await;
    assert_eq!(client_id, "seat-9");
    assert_eq!(player, Player::O);

    // One cell filled, so the responding seat moves next.
    assert!(client.is_game_active());
    assert_eq!(client.board().await, snapshot("X........"));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Server snapshots
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshots_flow_through_to_events_in_order() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Ok(state_json("X........"))),
        Some(Ok(state_json("X..O....."))),
    ]);

    drain_until_seated(&mut events).await;

    // Our move echoed back: the turn passes to the peer.
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("X........"),
            win_line: None,
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::StatusChanged(GameStatus::Turn {
            current: Player::O,
            you: Some(Player::X),
        })
    );

    // The peer's move: the turn comes back.
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("X..O....."),
            win_line: None,
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::StatusChanged(GameStatus::Turn {
            current: Player::X,
            you: Some(Player::X),
        })
    );

    assert!(client.is_game_active());
    assert_eq!(client.board().await, snapshot("X..O....."));

    client.shutdown().await;
}

#[tokio::test]
async fn winning_snapshot_ends_the_game() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Ok(state_json("XXXOO...."))),
    ]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("XXXOO...."),
            win_line: Some([0, 1, 2]),
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::StatusChanged(GameStatus::Won { player: Player::X })
    );

    assert!(!client.is_game_active());
    assert_eq!(client.phase().await, SessionPhase::Terminal);

    // Moves on a finished board are dropped before reaching the wire.
    client.play(0).expect("play is accepted into the queue");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*sent.lock().unwrap(), vec!["play".to_owned()]);

    client.shutdown().await;
}

#[tokio::test]
async fn drawn_snapshot_ends_the_game() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Ok(state_json("XOXXOOOXX"))),
    ]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("XOXXOOOXX"),
            win_line: None,
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::StatusChanged(GameStatus::Draw));
    assert_eq!(client.phase().await, SessionPhase::Terminal);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Local moves
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn local_move_round_trip() {
    let (mut client, mut events, sent, _closed) = start_client(vec![Some(Ok(init_json_with(
        "seat-1",
        Player::X,
        "XO.......",
    )))]);

    drain_until_seated(&mut events).await;
    assert!(client.is_game_active());

    client.play(4).expect("play");

    // The optimistic mark shows up before any server echo. No status
    // change yet: the turn only passes once the server answers.
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("XO..X...."),
            win_line: None,
        }
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        *sent.lock().unwrap(),
        vec!["play".to_owned(), "PLAY:X:4".to_owned()]
    );
    assert!(!client.is_game_active(), "one move per server round-trip");
    assert_eq!(client.board().await, snapshot("XO..X...."));

    // A second move while the first is in flight never reaches the wire.
    client.play(5).expect("play is accepted into the queue");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sent.lock().unwrap().len(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn out_of_range_move_fails_fast() {
    let (mut client, mut events, sent, _closed) = start_client(vec![Some(Ok(init_json()))]);

    drain_until_seated(&mut events).await;

    let err = client.play(9).expect_err("index 9 is off the board");
    assert!(matches!(err, PlaybookError::CellOutOfRange { index: 9 }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*sent.lock().unwrap(), vec!["play".to_owned()]);

    client.shutdown().await;
}

#[tokio::test]
async fn local_winning_move_reports_before_the_echo() {
    let (mut client, mut events, sent, _closed) = start_client(vec![Some(Ok(init_json_with(
        "seat-1",
        Player::X,
        "XX.OO....",
    )))]);

    drain_until_seated(&mut events).await;

    client.play(2).expect("play");

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("XXXOO...."),
            win_line: Some([0, 1, 2]),
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::StatusChanged(GameStatus::Won { player: Player::X })
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        *sent.lock().unwrap(),
        vec!["play".to_owned(), "PLAY:X:2".to_owned()]
    );
    assert_eq!(client.phase().await, SessionPhase::Terminal);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Reconciliation
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn authoritative_snapshot_wins_conflicts() {
    // NOTE: the scripted snapshot races the local move, so this asserts
    // only the converged end state. The deterministic override ordering
    // is pinned down in the session unit tests.
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Ok(state_json("O...X...."))),
    ]);

    drain_until_seated(&mut events).await;

    let _ = client.play(4);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.board().await, snapshot("O...X...."));
    assert!(client.is_game_active(), "two cells filled, X to move");
    assert_eq!(sent.lock().unwrap()[0], "play");

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Reset flow
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn peer_reset_notice_and_clean_board() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(init_json_with("seat-1", Player::X, "XOX......"))),
        Some(Ok(reset_json())),
    ]);

    drain_until_seated(&mut events).await;

    // We never asked for this reset, so it reads as a peer notice.
    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::PeerReset);
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: Board::empty(),
            win_line: None,
        }
    );
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::StatusChanged(GameStatus::Turn {
            current: Player::X,
            you: Some(Player::X),
        })
    );

    assert!(client.is_game_active(), "X opens after a reset");

    client.shutdown().await;
}

#[tokio::test]
async fn requesting_a_reset_transmits_the_frame() {
    let (mut client, mut events, sent, _closed) = start_client(vec![Some(Ok(init_json_with(
        "seat-4",
        Player::O,
        "X........",
    )))]);

    drain_until_seated(&mut events).await;

    client.request_reset().expect("request_reset");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        *sent.lock().unwrap(),
        vec!["play".to_owned(), "RESET:O".to_owned()]
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Board completion
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn complete_freezes_the_session() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Ok(complete_json())),
        Some(Ok(state_json("XX.OO...."))),
    ]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::BoardComplete);
    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::StatusChanged(GameStatus::Complete));
    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::RestartVisible { visible: false });

    // A snapshot after completion still redraws, but carries no status
    // change and re-enables nothing.
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::BoardUpdated {
            board: snapshot("XX.OO...."),
            win_line: None,
        }
    );
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Empty)
    ));

    assert!(!client.is_game_active());
    assert_eq!(client.phase().await, SessionPhase::Terminal);

    // Neither moves nor restarts reach the wire anymore.
    client.play(0).expect("play is accepted into the queue");
    client.request_reset().expect("request_reset");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*sent.lock().unwrap(), vec!["play".to_owned()]);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Peer departure
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn peer_leave_is_a_notice_only() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(init_json_with("seat-1", Player::X, "X........"))),
        Some(Ok(leave_json())),
    ]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::PeerLeft);

    // The board and phase are untouched until the server says otherwise.
    assert_eq!(client.board().await, snapshot("X........"));
    assert_eq!(client.phase().await, SessionPhase::Active);

    client.shutdown().await;
}

#[tokio::test]
async fn leaving_seals_the_session() {
    let (mut client, mut events, sent, closed) = start_client(vec![Some(Ok(init_json()))]);

    drain_until_seated(&mut events).await;

    client.leave().expect("leave");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        *sent.lock().unwrap(),
        vec!["play".to_owned(), "LEAVE:X".to_owned()]
    );
    assert_eq!(client.phase().await, SessionPhase::Left);
    assert!(!client.is_game_active());
    assert!(client.is_connected(), "departure does not drop the link");

    // Post-departure requests produce no frames.
    client.play(0).expect("play is accepted into the queue");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sent.lock().unwrap().len(), 2);

    // Shutdown skips the goodbye since the departure already happened.
    client.shutdown().await;
    assert_eq!(
        *sent.lock().unwrap(),
        vec!["play".to_owned(), "LEAVE:X".to_owned()]
    );
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
}

// ════════════════════════════════════════════════════════════════════
// Protocol errors and disconnects
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn malformed_frame_raises_protocol_error_then_disconnects() {
    let (client, mut events, _sent, closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Ok("this is not json".to_owned())),
    ]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    let detail = match ev {
        GameEvent::ProtocolError { detail } => detail,
        other => panic!("expected ProtocolError, got {other:?}"),
    };
    assert!(
        detail.starts_with("malformed server frame"),
        "unexpected detail: {detail}"
    );

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::Disconnected {
            reason: Some(detail),
        }
    );

    // The loop is gone: channel closed, socket closed, session dead.
    assert!(events.recv().await.is_none());
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(!client.is_connected());
    assert!(matches!(client.play(0), Err(PlaybookError::NotConnected)));
}

#[tokio::test]
async fn transport_error_disconnects_with_reason() {
    let (client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(init_json())),
        Some(Err(PlaybookError::TransportReceive("socket torn".into()))),
    ]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    match ev {
        GameEvent::Disconnected {
            reason: Some(reason),
        } => assert!(reason.contains("socket torn"), "unexpected: {reason}"),
        other => panic!("expected Disconnected with a reason, got {other:?}"),
    }

    assert!(events.recv().await.is_none());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn server_close_disconnects_quietly() {
    let (client, mut events, _sent, closed) =
        start_client(vec![Some(Ok(init_json())), None]);

    drain_until_seated(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert_eq!(ev, GameEvent::Disconnected { reason: None });
    assert!(events.recv().await.is_none());

    // The peer closed the socket; there was nothing left to close.
    assert!(!closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(!client.is_connected());
}

// ════════════════════════════════════════════════════════════════════
// Shutdown and resumption
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn shutdown_sends_goodbye_and_reports_disconnect() {
    let (mut client, mut events, sent, closed) = start_client(vec![Some(Ok(init_json()))]);

    drain_until_seated(&mut events).await;

    client.shutdown().await;

    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::Disconnected {
            reason: Some("client shut down".to_owned()),
        }
    );

    assert_eq!(
        *sent.lock().unwrap(),
        vec!["play".to_owned(), "LEAVE:X".to_owned()]
    );
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
    assert_eq!(client.phase().await, SessionPhase::Left);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn resumed_seat_token_is_replaced_by_init() {
    let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(init_json_with(
        "tok-new",
        Player::O,
        "X........",
    )))]);
    let config =
        PlaybookConfig::new("ws://test.invalid/playbook").with_client_id("tok-old");
    let (mut client, mut events) = PlaybookClient::start(transport, config);

    let (client_id, player) = drain_until_seated(&mut events).await;
    assert_eq!(client_id, "tok-new");
    assert_eq!(player, Player::O);

    // The provisional token gives way to whatever INIT carries.
    assert_eq!(client.client_id().await.as_deref(), Some("tok-new"));
    assert!(client.is_game_active(), "one cell filled, O to move");

    client.shutdown().await;
}
