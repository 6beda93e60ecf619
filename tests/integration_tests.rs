//! Integration tests for the session synchronization layer
//!
//! These tests validate cross-component interactions and real WebSocket behavior.

use client::{
    Client, ConnectionAction, ConnectionConfig, ConnectionState, GameSync, Notification, SessionEnd, SyncConfig,
    SyncError,
};
use futures_util::{SinkExt, StreamExt};
use shared::{decode, encode, ClientMessage, GamePhase, MessageKind, ServerMessage};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

fn open_generation(actions: &[ConnectionAction]) -> Option<u64> {
    actions.iter().rev().find_map(|action| match action {
        ConnectionAction::Open { generation, .. } => Some(*generation),
        _ => None,
    })
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn drain_until_closed(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(message)) = ws.next().await {
        if message.is_close() {
            break;
        }
    }
}

async fn accept_ws(listener: &TcpListener) -> Option<WebSocketStream<TcpStream>> {
    let (stream, _) = listener.accept().await.ok()?;
    accept_async(stream).await.ok()
}

/// Sends a joined player, a chat line and a room shutdown. Returns the join frame.
async fn serve_one_session(listener: TcpListener) -> Option<String> {
    let mut ws = accept_ws(&listener).await?;
    let join = next_text(&mut ws).await?;

    let frames = [
        r#"{"type":"player_joined","username":"bob","x":5,"y":5}"#,
        r#"{"type":"chat_message","username":"bob","message":"hi","timestamp":1}"#,
        r#"{"type":"room_shutdown","reason":"Game ended, returning to menu"}"#,
    ];
    for frame in frames {
        ws.send(Message::Text(frame.to_string())).await.ok()?;
    }
    drain_until_closed(&mut ws).await;
    Some(join)
}

async fn reject_first_join(listener: TcpListener) -> Option<()> {
    let mut ws = accept_ws(&listener).await?;
    next_text(&mut ws).await?;
    let frame = r#"{"type":"connection_failed","reason":"room_full","message":"Room is full"}"#;
    ws.send(Message::Text(frame.to_string())).await.ok()?;
    drain_until_closed(&mut ws).await;
    Some(())
}

/// Drops the first socket without a close frame, then shuts the room on the
/// second. Returns how many joins arrived.
async fn drop_then_shutdown(listener: TcpListener) -> Option<u32> {
    let mut joins = 0;

    let mut ws = accept_ws(&listener).await?;
    if next_text(&mut ws).await.is_some() {
        joins += 1;
    }
    drop(ws);

    let mut ws = accept_ws(&listener).await?;
    if next_text(&mut ws).await.is_some() {
        joins += 1;
    }
    let frame = r#"{"type":"room_shutdown","reason":"restart"}"#;
    ws.send(Message::Text(frame.to_string())).await.ok()?;
    drain_until_closed(&mut ws).await;
    Some(joins)
}

fn config_for(addr: std::net::SocketAddr) -> SyncConfig {
    SyncConfig::default().with_connection(
        ConnectionConfig::default()
            .with_server_url(format!("ws://{}/game", addr))
            .with_reconnect_delay(Duration::from_millis(50)),
    )
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Every closed message kind survives its own wire name
    #[tokio::test]
    async fn message_kinds_match_wire_names() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::parse("not_a_message"), None);
    }

    /// A realistic snapshot frame decodes with defaults filled in
    #[tokio::test]
    async fn game_state_frame_decodes() {
        let frame = r#"{
            "type": "game_state",
            "players": {
                "alice": {"x": 10.5, "y": 20, "health": 3},
                "bob": {"x": 0, "y": 0, "isDead": true, "skin": "rogue"}
            }
        }"#;

        match assert_ok!(decode(frame)) {
            ServerMessage::GameState(state) => {
                assert_eq!(state.players.len(), 2);
                assert_eq!(state.players["alice"].health, Some(3));
                assert!(state.players["bob"].is_dead);
                assert_eq!(state.players["bob"].skin.as_deref(), Some("rogue"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    /// Outbound intents always carry the sender identity
    #[tokio::test]
    async fn intents_carry_identity() {
        let frame = assert_ok!(encode(&ClientMessage::ReadyToggle, "alice"));
        let value: serde_json::Value = assert_ok!(serde_json::from_str(&frame));
        assert_eq!(value["type"], "ready_toggle");
        assert_eq!(value["username"], "alice");
    }
}

/// SESSION SYNCHRONIZATION TESTS
mod sync_tests {
    use super::*;

    fn opened(config: SyncConfig, now: Instant) -> GameSync {
        let mut sync = GameSync::new(config);
        assert_ok!(sync.start_session("alice", "map1", now));
        let generation = open_generation(&sync.drain_actions()).unwrap();
        sync.transport_opened(generation, now);
        sync.drain_actions();
        sync.drain_notifications();
        sync
    }

    /// Walks a full match through the session phases
    #[tokio::test]
    async fn full_match_lifecycle() {
        let now = Instant::now();
        let mut sync = opened(SyncConfig::default(), now);
        let mut phases = sync.subscribe_phase();

        let frames = [
            r#"{"type":"room_status","gameState":"WAITING","playerCount":2,"maxPlayers":4,"readyStates":{"alice":true,"bob":true}}"#,
            r#"{"type":"player_joined","username":"bob","x":100,"y":100}"#,
            r#"{"type":"countdown_started","duration":3}"#,
            r#"{"type":"countdown","seconds":2}"#,
            r#"{"type":"game_started","gameStartTime":1700000000000,"gameDuration":180000}"#,
            r#"{"type":"game_state","players":{"alice":{"x":10,"y":10,"health":4},"bob":{"x":100,"y":100,"health":4}}}"#,
            r#"{"type":"time_remaining","timeRemaining":170000,"timeElapsed":10000}"#,
            r#"{"type":"player_damaged","username":"bob","currentHealth":0,"died":true,"source":"alice"}"#,
            r#"{"type":"game_ended","reason":"last_player_standing","stats":{"gameDuration":10000,"rankings":[{"playerId":"alice","rank":1,"kills":1,"status":"alive"}]}}"#,
        ];
        for frame in frames {
            assert_ok!(sync.handle_frame(frame, now));
        }

        assert_eq!(sync.phase(), GamePhase::Finished);
        assert!(assert_ok!(phases.has_changed()));
        assert_eq!(*phases.borrow_and_update(), GamePhase::Finished);
        assert_eq!(sync.tracker().time_remaining_ms(), Some(170000));

        let notifications = sync.drain_notifications();
        assert!(notifications.contains(&Notification::PlayerJoined { id: "bob".into() }));
        assert!(notifications.contains(&Notification::PlayerDied { id: "bob".into() }));
        assert!(notifications
            .iter()
            .any(|n| matches!(n, Notification::GameEnded(ended) if ended.stats.rankings.len() == 1)));
        let phase_changes = notifications
            .iter()
            .filter(|n| matches!(n, Notification::PhaseChanged(_)))
            .count();
        assert_eq!(phase_changes, 3);
    }

    /// A connection that keeps failing gives up after the configured attempts
    #[tokio::test]
    async fn reconnection_is_bounded() {
        let start = Instant::now();
        let config = SyncConfig::default().with_connection(
            ConnectionConfig::default()
                .with_max_reconnect_attempts(3)
                .with_reconnect_delay(Duration::from_millis(10)),
        );
        let mut sync = GameSync::new(config);
        assert_ok!(sync.start_session("alice", "map1", start));

        let mut opens = 0;
        let mut now = start;
        for _ in 0..10 {
            let Some(generation) = open_generation(&sync.drain_actions()) else {
                break;
            };
            opens += 1;
            sync.transport_error(generation, "connection refused", now);
            now += Duration::from_millis(10);
            sync.frame(now, 0.01);
        }

        assert_eq!(opens, 4);
        assert_eq!(sync.session().connection_state, ConnectionState::Closed);
        assert!(sync
            .drain_notifications()
            .contains(&Notification::ReconnectExhausted { attempts: 3 }));
    }

    /// Events from a replaced socket never reach the new session
    #[tokio::test]
    async fn stale_socket_events_are_ignored() {
        let now = Instant::now();
        let mut sync = GameSync::new(SyncConfig::default());
        assert_ok!(sync.start_session("alice", "map1", now));
        let first = open_generation(&sync.drain_actions()).unwrap();

        sync.transport_error(first, "reset", now);
        sync.frame(now + Duration::from_secs(3), 0.0);
        let second = open_generation(&sync.drain_actions()).unwrap();
        assert_ne!(first, second);

        sync.transport_opened(first, now);
        assert_eq!(sync.session().connection_state, ConnectionState::Connecting);
        sync.transport_opened(second, now);
        assert_eq!(sync.session().connection_state, ConnectionState::Open);
    }
}

/// REAL WEBSOCKET TESTS
mod websocket_tests {
    use super::*;

    /// Joins, receives state and leaves when the room shuts down
    #[tokio::test]
    async fn session_against_local_server() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());

        let server = tokio::spawn(serve_one_session(listener));

        let mut client = Client::new(config_for(addr), "alice", "map1");
        let outcome = assert_ok!(timeout(Duration::from_secs(5), client.run()).await);
        assert_eq!(
            assert_ok!(outcome),
            SessionEnd::RoomShutdown {
                reason: "Game ended, returning to menu".into()
            }
        );

        let join = assert_ok!(server.await).unwrap();
        let value: serde_json::Value = assert_ok!(serde_json::from_str(&join));
        assert_eq!(value["type"], "join_game");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["map"], "map1");
        assert!(client.sync().router().is_empty());
    }

    /// A rejection ends the run with an error instead of retrying
    #[tokio::test]
    async fn rejection_is_reported() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());

        tokio::spawn(reject_first_join(listener));

        let mut client = Client::new(config_for(addr), "alice", "map1");
        let outcome = assert_ok!(timeout(Duration::from_secs(5), client.run()).await);
        match outcome {
            Err(SyncError::Rejected { reason, message }) => {
                assert_eq!(reason, "room_full");
                assert_eq!(message.as_deref(), Some("Room is full"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    /// A socket dropped without a close handshake is reopened
    #[tokio::test]
    async fn abnormal_drop_reconnects() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());

        let server = tokio::spawn(drop_then_shutdown(listener));

        let mut client = Client::new(config_for(addr), "alice", "map1");
        let outcome = assert_ok!(timeout(Duration::from_secs(5), client.run()).await);
        assert_eq!(
            assert_ok!(outcome),
            SessionEnd::RoomShutdown {
                reason: "restart".into()
            }
        );
        assert_eq!(assert_ok!(server.await), Some(2));
    }
}
