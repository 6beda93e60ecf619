//! JSON message envelopes exchanged with the game server.
//!
//! Every frame is a flat object whose `type` field selects the payload shape.
//! Decoding happens once at the boundary: a frame that does not match the shape
//! of its declared type is rejected with a [`ProtocolError`] and never reaches
//! the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame has no `type` discriminator")]
    MissingType,

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Room life-cycle stage as reported by `room_status`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Waiting,
    Countdown,
    Playing,
    Finished,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Waiting => "WAITING",
            GamePhase::Countdown => "COUNTDOWN",
            GamePhase::Playing => "PLAYING",
            GamePhase::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NpcBehavior {
    Idle,
    Patrol,
    Chase,
    Attack,
    Retreat,
}

/// Closed set of inbound message tags. Router registrations are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    PlayerJoined,
    PlayerLeft,
    PlayerUpdate,
    PlayerList,
    GameState,
    PlayerDamaged,
    PlayerHealed,
    NpcSpawned,
    NpcUpdate,
    NpcDamaged,
    NpcRemoved,
    ProjectileCreated,
    ProjectileRemoved,
    RoomStatus,
    CountdownStarted,
    Countdown,
    CountdownCancelled,
    GameStarted,
    TimeRemaining,
    GameEnded,
    RoomShutdown,
    ConnectionFailed,
    GrowingDamageZoneStart,
    GrowingDamageZoneUpdate,
    GrowingDamageZoneStop,
    ChatMessage,
}

impl MessageKind {
    pub const ALL: [MessageKind; 26] = [
        MessageKind::PlayerJoined,
        MessageKind::PlayerLeft,
        MessageKind::PlayerUpdate,
        MessageKind::PlayerList,
        MessageKind::GameState,
        MessageKind::PlayerDamaged,
        MessageKind::PlayerHealed,
        MessageKind::NpcSpawned,
        MessageKind::NpcUpdate,
        MessageKind::NpcDamaged,
        MessageKind::NpcRemoved,
        MessageKind::ProjectileCreated,
        MessageKind::ProjectileRemoved,
        MessageKind::RoomStatus,
        MessageKind::CountdownStarted,
        MessageKind::Countdown,
        MessageKind::CountdownCancelled,
        MessageKind::GameStarted,
        MessageKind::TimeRemaining,
        MessageKind::GameEnded,
        MessageKind::RoomShutdown,
        MessageKind::ConnectionFailed,
        MessageKind::GrowingDamageZoneStart,
        MessageKind::GrowingDamageZoneUpdate,
        MessageKind::GrowingDamageZoneStop,
        MessageKind::ChatMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::PlayerJoined => "player_joined",
            MessageKind::PlayerLeft => "player_left",
            MessageKind::PlayerUpdate => "player_update",
            MessageKind::PlayerList => "player_list",
            MessageKind::GameState => "game_state",
            MessageKind::PlayerDamaged => "player_damaged",
            MessageKind::PlayerHealed => "player_healed",
            MessageKind::NpcSpawned => "npc_spawned",
            MessageKind::NpcUpdate => "npc_update",
            MessageKind::NpcDamaged => "npc_damaged",
            MessageKind::NpcRemoved => "npc_removed",
            MessageKind::ProjectileCreated => "projectile_created",
            MessageKind::ProjectileRemoved => "projectile_removed",
            MessageKind::RoomStatus => "room_status",
            MessageKind::CountdownStarted => "countdown_started",
            MessageKind::Countdown => "countdown",
            MessageKind::CountdownCancelled => "countdown_cancelled",
            MessageKind::GameStarted => "game_started",
            MessageKind::TimeRemaining => "time_remaining",
            MessageKind::GameEnded => "game_ended",
            MessageKind::RoomShutdown => "room_shutdown",
            MessageKind::ConnectionFailed => "connection_failed",
            MessageKind::GrowingDamageZoneStart => "growing_damage_zone_start",
            MessageKind::GrowingDamageZoneUpdate => "growing_damage_zone_update",
            MessageKind::GrowingDamageZoneStop => "growing_damage_zone_stop",
            MessageKind::ChatMessage => "chat_message",
        }
    }

    pub fn parse(tag: &str) -> Option<MessageKind> {
        MessageKind::ALL.iter().copied().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoined {
    pub username: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub skin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerLeft {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub username: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub vx: f32,
    #[serde(default)]
    pub vy: f32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub skin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerListEntry {
    pub username: String,
    #[serde(default)]
    pub skin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerList {
    pub players: Vec<PlayerListEntry>,
}

/// One player's entry inside a full `game_state` snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub vx: f32,
    #[serde(default)]
    pub vy: f32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default)]
    pub skin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameStateSnapshot {
    pub players: HashMap<String, PlayerSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDamaged {
    pub username: String,
    pub current_health: i32,
    #[serde(default)]
    pub died: bool,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHealed {
    pub username: String,
    pub current_health: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcSpawned {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub max_health: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcSnapshot {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default)]
    pub behavior: Option<NpcBehavior>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NpcUpdate {
    pub npcs: HashMap<String, NpcSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NpcDamaged {
    pub id: String,
    pub health: i32,
    #[serde(default)]
    pub died: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NpcRemoved {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileCreated {
    pub id: String,
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    pub direction_x: f32,
    pub direction_y: f32,
    #[serde(default)]
    pub is_npc: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectileRemoved {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub game_state: GamePhase,
    #[serde(default)]
    pub player_count: u32,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub ready_states: HashMap<String, bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CountdownStarted {
    pub duration: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CountdownTick {
    pub seconds: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    #[serde(default)]
    pub game_start_time: Option<u64>,
    #[serde(default)]
    pub game_duration: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRemaining {
    pub time_remaining: u64,
    #[serde(default)]
    pub time_elapsed: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRanking {
    pub player_id: String,
    pub rank: u32,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub death_order: Option<u32>,
    #[serde(default)]
    pub coins_awarded: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeathRecord {
    pub player_id: String,
    pub death_order: u32,
    #[serde(default)]
    pub death_time: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    #[serde(default)]
    pub game_duration: u64,
    #[serde(default)]
    pub player_kills: HashMap<String, u32>,
    #[serde(default)]
    pub rankings: Vec<PlayerRanking>,
    #[serde(default)]
    pub death_order: Vec<DeathRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameEnded {
    pub reason: String,
    #[serde(default)]
    pub stats: GameStats,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomShutdown {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConnectionFailed {
    pub reason: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStart {
    pub center_x: f32,
    pub center_y: f32,
    pub initial_radius: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneUpdate {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    #[serde(default)]
    pub target_radius: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatLine {
    pub username: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: u64,
}

/// Everything the server may send. The serde tag doubles as the wire `type`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    PlayerUpdate(PlayerUpdate),
    PlayerList(PlayerList),
    GameState(GameStateSnapshot),
    PlayerDamaged(PlayerDamaged),
    PlayerHealed(PlayerHealed),
    NpcSpawned(NpcSpawned),
    NpcUpdate(NpcUpdate),
    NpcDamaged(NpcDamaged),
    NpcRemoved(NpcRemoved),
    ProjectileCreated(ProjectileCreated),
    ProjectileRemoved(ProjectileRemoved),
    RoomStatus(RoomStatus),
    CountdownStarted(CountdownStarted),
    Countdown(CountdownTick),
    CountdownCancelled,
    GameStarted(GameStarted),
    TimeRemaining(TimeRemaining),
    GameEnded(GameEnded),
    RoomShutdown(RoomShutdown),
    ConnectionFailed(ConnectionFailed),
    GrowingDamageZoneStart(ZoneStart),
    GrowingDamageZoneUpdate(ZoneUpdate),
    GrowingDamageZoneStop,
    ChatMessage(ChatLine),
}

impl ServerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::PlayerJoined(_) => MessageKind::PlayerJoined,
            ServerMessage::PlayerLeft(_) => MessageKind::PlayerLeft,
            ServerMessage::PlayerUpdate(_) => MessageKind::PlayerUpdate,
            ServerMessage::PlayerList(_) => MessageKind::PlayerList,
            ServerMessage::GameState(_) => MessageKind::GameState,
            ServerMessage::PlayerDamaged(_) => MessageKind::PlayerDamaged,
            ServerMessage::PlayerHealed(_) => MessageKind::PlayerHealed,
            ServerMessage::NpcSpawned(_) => MessageKind::NpcSpawned,
            ServerMessage::NpcUpdate(_) => MessageKind::NpcUpdate,
            ServerMessage::NpcDamaged(_) => MessageKind::NpcDamaged,
            ServerMessage::NpcRemoved(_) => MessageKind::NpcRemoved,
            ServerMessage::ProjectileCreated(_) => MessageKind::ProjectileCreated,
            ServerMessage::ProjectileRemoved(_) => MessageKind::ProjectileRemoved,
            ServerMessage::RoomStatus(_) => MessageKind::RoomStatus,
            ServerMessage::CountdownStarted(_) => MessageKind::CountdownStarted,
            ServerMessage::Countdown(_) => MessageKind::Countdown,
            ServerMessage::CountdownCancelled => MessageKind::CountdownCancelled,
            ServerMessage::GameStarted(_) => MessageKind::GameStarted,
            ServerMessage::TimeRemaining(_) => MessageKind::TimeRemaining,
            ServerMessage::GameEnded(_) => MessageKind::GameEnded,
            ServerMessage::RoomShutdown(_) => MessageKind::RoomShutdown,
            ServerMessage::ConnectionFailed(_) => MessageKind::ConnectionFailed,
            ServerMessage::GrowingDamageZoneStart(_) => MessageKind::GrowingDamageZoneStart,
            ServerMessage::GrowingDamageZoneUpdate(_) => MessageKind::GrowingDamageZoneUpdate,
            ServerMessage::GrowingDamageZoneStop => MessageKind::GrowingDamageZoneStop,
            ServerMessage::ChatMessage(_) => MessageKind::ChatMessage,
        }
    }
}

/// Decodes one text frame into a typed message.
pub fn decode(frame: &str) -> Result<ServerMessage, ProtocolError> {
    let value: Value = serde_json::from_str(frame).map_err(ProtocolError::Malformed)?;

    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    let kind = MessageKind::parse(tag).ok_or_else(|| ProtocolError::UnknownType(tag.to_string()))?;

    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

/// Client intents. The sender's identity is added by [`encode`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinGame {
        map: String,
    },
    #[serde(rename_all = "camelCase")]
    Position {
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        flip_x: bool,
    },
    #[serde(rename_all = "camelCase")]
    Attack {
        direction_x: f32,
        direction_y: f32,
    },
    Damage {
        amount: i32,
    },
    Heal {
        amount: i32,
    },
    #[serde(rename_all = "camelCase")]
    NpcDamage {
        npc_id: String,
        damage: i32,
    },
    ReadyToggle,
    ChatMessage {
        message: String,
        timestamp: u64,
    },
    Heartbeat {
        timestamp: u64,
    },
}

impl ClientMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientMessage::JoinGame { .. } => "join_game",
            ClientMessage::Position { .. } => "position",
            ClientMessage::Attack { .. } => "attack",
            ClientMessage::Damage { .. } => "damage",
            ClientMessage::Heal { .. } => "heal",
            ClientMessage::NpcDamage { .. } => "npc_damage",
            ClientMessage::ReadyToggle => "ready_toggle",
            ClientMessage::ChatMessage { .. } => "chat_message",
            ClientMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Serializes an intent, stamping `username` unless the intent already carries one.
pub fn encode(message: &ClientMessage, identity: &str) -> Result<String, ProtocolError> {
    let mut value = serde_json::to_value(message).map_err(ProtocolError::Encode)?;
    if let Value::Object(fields) = &mut value {
        fields
            .entry("username")
            .or_insert_with(|| Value::String(identity.to_string()));
    }
    serde_json::to_string(&value).map_err(ProtocolError::Encode)
}
