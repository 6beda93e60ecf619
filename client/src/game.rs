//! Session wiring.
//!
//! [`GameSync`] owns one instance of every synchronization component and
//! routes inbound frames through them: decode, phase tracking, then dispatch
//! to the handlers it installed on the router. The handlers it installs are
//! held as subscriptions, so tearing a session down unregisters all of them.

use crate::config::SyncConfig;
use crate::connection::{
    unix_millis, ConnectionAction, ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState,
};
use crate::entity::{Diff, EntityEvent, EntityReconciler, MoveInput, NpcKind, PlayerKind, Snapshot};
use crate::error::{HandlerError, SyncError};
use crate::input::InputManager;
use crate::projectile::ProjectileStore;
use crate::router::{Handler, Inbound, MessageRouter, Subscription};
use crate::session::{PhaseTransition, Session, SessionStateTracker};
use crate::zones::{LocalStatus, ZoneEffect, ZoneGeometry, ZoneKind, ZoneSynchronizer};
use log::{debug, info, warn};
use shared::protocol::GameEnded;
use shared::{decode, ClientMessage, GamePhase, MessageKind, ServerMessage, Vec2};
use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::time::Instant;
use tokio::sync::watch;

/// Something the UI layer may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PhaseChanged(PhaseTransition),
    ConnectionState(ConnectionState),
    PlayerJoined { id: String },
    PlayerLeft { id: String },
    PlayerDied { id: String },
    NpcDied { id: String },
    /// The renderer should drop whatever it holds for this NPC.
    NpcRemoved { id: String },
    SkinChanged { id: String, skin: String },
    Chat {
        from: String,
        message: String,
        timestamp: u64,
    },
    GameEnded(GameEnded),
    ZoneExited { zone_id: String },
    RoomShutdown { reason: String },
    ConnectionRejected {
        reason: String,
        message: Option<String>,
    },
    ReconnectExhausted { attempts: u32 },
}

struct SessionComponents {
    players: RefCell<EntityReconciler<PlayerKind>>,
    npcs: RefCell<EntityReconciler<NpcKind>>,
    projectiles: RefCell<ProjectileStore>,
    zones: RefCell<ZoneSynchronizer>,
    notifications: RefCell<VecDeque<Notification>>,
    /// Set by `game_started`; the next full snapshot respawns everyone in it.
    round_reset_pending: Cell<bool>,
}

impl SessionComponents {
    fn notify(&self, notification: Notification) {
        self.notifications.borrow_mut().push_back(notification);
    }

    fn local_id(&self) -> Option<String> {
        self.players.borrow().local_id().map(str::to_string)
    }

    fn update_player(&self, id: &str, diff: Diff, at: Instant) {
        self.players.borrow_mut().apply_update(id, diff, at);
    }

    /// Turns reconciler events into notifications. Both queues are empty afterwards.
    fn pump_entity_events(&self) {
        let player_events = self.players.borrow_mut().drain_events();
        for event in player_events {
            match event {
                EntityEvent::Died { id } => self.notify(Notification::PlayerDied { id }),
                EntityEvent::Removed { id } => self.notify(Notification::PlayerLeft { id }),
                EntityEvent::SkinChanged { id, skin } => self.notify(Notification::SkinChanged { id, skin }),
                EntityEvent::Created { .. } | EntityEvent::HealthChanged { .. } | EntityEvent::Respawned { .. } => {}
            }
        }

        let npc_events = self.npcs.borrow_mut().drain_events();
        for event in npc_events {
            match event {
                EntityEvent::Died { id } => self.notify(Notification::NpcDied { id }),
                EntityEvent::Removed { id } => self.notify(Notification::NpcRemoved { id }),
                EntityEvent::SkinChanged { id, skin } => self.notify(Notification::SkinChanged { id, skin }),
                EntityEvent::Created { .. } | EntityEvent::HealthChanged { .. } | EntityEvent::Respawned { .. } => {}
            }
        }
    }
}

type Apply = fn(&SessionComponents, &Inbound) -> Result<(), HandlerError>;

fn bind(components: &Rc<SessionComponents>, apply: Apply) -> Handler {
    let components = Rc::clone(components);
    Handler::new(move |inbound| apply(&components, inbound))
}

fn unexpected(inbound: &Inbound) -> HandlerError {
    HandlerError::new("dispatch", format!("unexpected payload for {}", inbound.kind()))
}

fn on_player_joined(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::PlayerJoined(joined) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    let created = c
        .players
        .borrow_mut()
        .create(&joined.username, Snapshot::from(joined), inbound.received_at);
    if created && c.local_id().as_deref() != Some(joined.username.as_str()) {
        c.notify(Notification::PlayerJoined {
            id: joined.username.clone(),
        });
    }
    Ok(())
}

fn on_player_left(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::PlayerLeft(left) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    if c.local_id().as_deref() == Some(left.username.as_str()) {
        debug!("Ignoring player_left for the local player");
        return Ok(());
    }
    c.players.borrow_mut().remove(&left.username);
    Ok(())
}

fn on_player_update(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::PlayerUpdate(update) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.update_player(&update.username, Diff::from(update), inbound.received_at);
    Ok(())
}

fn on_player_list(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::PlayerList(list) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    let mut players = c.players.borrow_mut();
    for entry in &list.players {
        if players.contains(&entry.username) {
            if let Some(skin) = &entry.skin {
                players.apply_update(&entry.username, Diff::new().with_skin(skin.as_str()), inbound.received_at);
            }
            continue;
        }
        let snapshot = Snapshot {
            skin: entry.skin.clone(),
            ..Snapshot::default()
        };
        players.create(&entry.username, snapshot, inbound.received_at);
    }
    Ok(())
}

fn on_game_state(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::GameState(state) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    let at = inbound.received_at;
    let respawn_all = c.round_reset_pending.replace(false);
    let local_id = c.local_id();

    for (id, snapshot) in &state.players {
        let known = c.players.borrow().contains(id);
        if respawn_all {
            c.players.borrow_mut().respawn(id, Snapshot::from(snapshot), at);
        } else if known {
            c.update_player(id, Diff::from(snapshot), at);
        } else {
            c.players.borrow_mut().create(id, Snapshot::from(snapshot), at);
        }
    }

    let listed: HashSet<&str> = state.players.keys().map(String::as_str).collect();
    let mut players = c.players.borrow_mut();
    for id in players.ids() {
        if !listed.contains(id.as_str()) && local_id.as_deref() != Some(id.as_str()) {
            debug!("Player {} missing from snapshot, removing", id);
            players.remove(&id);
        }
    }
    Ok(())
}

fn on_player_damaged(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::PlayerDamaged(damaged) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    if let Some(source) = &damaged.source {
        debug!("{} damaged by {}", damaged.username, source);
    }
    c.update_player(&damaged.username, Diff::from(damaged), inbound.received_at);
    Ok(())
}

fn on_player_healed(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::PlayerHealed(healed) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.update_player(&healed.username, Diff::from(healed), inbound.received_at);
    Ok(())
}

fn on_npc_spawned(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::NpcSpawned(spawned) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.npcs
        .borrow_mut()
        .create(&spawned.id, Snapshot::from(spawned), inbound.received_at);
    Ok(())
}

fn on_npc_update(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::NpcUpdate(update) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    let mut npcs = c.npcs.borrow_mut();
    for (id, snapshot) in &update.npcs {
        npcs.apply_update(id, Diff::from(snapshot), inbound.received_at);
    }
    Ok(())
}

fn on_npc_damaged(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::NpcDamaged(damaged) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.npcs
        .borrow_mut()
        .apply_update(&damaged.id, Diff::from(damaged), inbound.received_at);
    Ok(())
}

fn on_npc_removed(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::NpcRemoved(removed) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.npcs.borrow_mut().remove(&removed.id);
    Ok(())
}

fn on_projectile_created(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::ProjectileCreated(created) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    let local_id = c.local_id();
    c.projectiles
        .borrow_mut()
        .spawn_remote(created, local_id.as_deref(), inbound.received_at);
    Ok(())
}

fn on_projectile_removed(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::ProjectileRemoved(removed) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.projectiles.borrow_mut().remove(&removed.id);
    Ok(())
}

fn on_zone_start(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::GrowingDamageZoneStart(start) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.zones.borrow_mut().begin_shrinking(
        Vec2::new(start.center_x, start.center_y),
        start.initial_radius,
        inbound.received_at,
    );
    Ok(())
}

fn on_zone_update(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::GrowingDamageZoneUpdate(update) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.zones.borrow_mut().update_shrinking(
        Vec2::new(update.center_x, update.center_y),
        update.radius,
        update.target_radius,
        inbound.received_at,
    );
    Ok(())
}

fn on_zone_stop(c: &SessionComponents, _inbound: &Inbound) -> Result<(), HandlerError> {
    c.zones.borrow_mut().end_shrinking();
    Ok(())
}

fn on_chat(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::ChatMessage(line) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.notify(Notification::Chat {
        from: line.username.clone(),
        message: line.message.clone(),
        timestamp: line.timestamp,
    });
    Ok(())
}

fn on_game_ended(c: &SessionComponents, inbound: &Inbound) -> Result<(), HandlerError> {
    let ServerMessage::GameEnded(ended) = &inbound.message else {
        return Err(unexpected(inbound));
    };
    c.notify(Notification::GameEnded(ended.clone()));
    Ok(())
}

const SESSION_HANDLERS: [(MessageKind, Apply); 19] = [
    (MessageKind::PlayerJoined, on_player_joined),
    (MessageKind::PlayerLeft, on_player_left),
    (MessageKind::PlayerUpdate, on_player_update),
    (MessageKind::PlayerList, on_player_list),
    (MessageKind::GameState, on_game_state),
    (MessageKind::PlayerDamaged, on_player_damaged),
    (MessageKind::PlayerHealed, on_player_healed),
    (MessageKind::NpcSpawned, on_npc_spawned),
    (MessageKind::NpcUpdate, on_npc_update),
    (MessageKind::NpcDamaged, on_npc_damaged),
    (MessageKind::NpcRemoved, on_npc_removed),
    (MessageKind::ProjectileCreated, on_projectile_created),
    (MessageKind::ProjectileRemoved, on_projectile_removed),
    (MessageKind::GrowingDamageZoneStart, on_zone_start),
    (MessageKind::GrowingDamageZoneUpdate, on_zone_update),
    (MessageKind::GrowingDamageZoneStop, on_zone_stop),
    (MessageKind::ChatMessage, on_chat),
    (MessageKind::GameEnded, on_game_ended),
    (MessageKind::GameStarted, on_game_started),
];

fn on_game_started(c: &SessionComponents, _inbound: &Inbound) -> Result<(), HandlerError> {
    c.round_reset_pending.set(true);
    c.projectiles.borrow_mut().clear();
    Ok(())
}

pub struct GameSync {
    connection: ConnectionHandle,
    router: MessageRouter,
    tracker: SessionStateTracker,
    components: Rc<SessionComponents>,
    input: InputManager,
    subscriptions: Vec<Subscription>,
}

impl GameSync {
    pub fn new(config: SyncConfig) -> Self {
        let components = SessionComponents {
            players: RefCell::new(EntityReconciler::new(&config.entities, None)),
            npcs: RefCell::new(EntityReconciler::new(&config.entities, None)),
            projectiles: RefCell::new(ProjectileStore::new(&config.projectiles)),
            zones: RefCell::new(ZoneSynchronizer::new(config.zones.clone())),
            notifications: RefCell::new(VecDeque::new()),
            round_reset_pending: Cell::new(false),
        };

        Self {
            connection: ConnectionHandle::new(ConnectionManager::new(config.connection.clone())),
            router: MessageRouter::new(),
            tracker: SessionStateTracker::new(),
            components: Rc::new(components),
            input: InputManager::new(&config.input),
            subscriptions: Vec::new(),
        }
    }

    /// Begins a session for `identity` in `target_room`.
    ///
    /// Anything left from a previous session is torn down first, so handlers
    /// and timers never accumulate across sessions. Starting a session also
    /// lifts a permanent shutdown.
    pub fn start_session(&mut self, identity: &str, target_room: &str, now: Instant) -> Result<(), SyncError> {
        if !self.subscriptions.is_empty() {
            self.teardown(false);
        }
        self.connection.borrow_mut().reset_shutdown();
        self.connection.borrow_mut().connect(identity, target_room, now)?;

        self.components
            .players
            .borrow_mut()
            .set_local_identity(Some(identity.to_string()));
        self.install_handlers();
        info!("Session started for {} in {}", identity, target_room);
        Ok(())
    }

    fn install_handlers(&mut self) {
        if !self.subscriptions.is_empty() {
            return;
        }

        for (kind, apply) in SESSION_HANDLERS {
            let subscription = self.router.on(kind, bind(&self.components, apply));
            self.subscriptions.push(subscription);
        }

        let connection = self.connection.clone();
        let room_shutdown = Handler::new(move |inbound| {
            let ServerMessage::RoomShutdown(shutdown) = &inbound.message else {
                return Err(unexpected(inbound));
            };
            connection
                .borrow_mut()
                .handle_room_shutdown(&shutdown.reason, inbound.received_at);
            Ok(())
        });
        self.subscriptions
            .push(self.router.on(MessageKind::RoomShutdown, room_shutdown));

        let connection = self.connection.clone();
        let connection_failed = Handler::new(move |inbound| {
            let ServerMessage::ConnectionFailed(failed) = &inbound.message else {
                return Err(unexpected(inbound));
            };
            connection
                .borrow_mut()
                .handle_connection_failed(&failed.reason, failed.message.as_deref());
            Ok(())
        });
        self.subscriptions
            .push(self.router.on(MessageKind::ConnectionFailed, connection_failed));
    }

    /// Decodes and processes one text frame. Frames that fail to decode are
    /// logged and dropped.
    pub fn handle_frame(&mut self, frame: &str, now: Instant) -> Result<MessageKind, SyncError> {
        match decode(frame) {
            Ok(message) => {
                let kind = message.kind();
                self.handle_message(message, now);
                Ok(kind)
            }
            Err(e) => {
                warn!("Dropping inbound frame: {}", e);
                Err(SyncError::Protocol(e))
            }
        }
    }

    pub fn handle_message(&mut self, message: ServerMessage, now: Instant) -> usize {
        if let Some(transition) = self.tracker.observe(&message) {
            self.components.notify(Notification::PhaseChanged(transition));
        }

        let inbound = Inbound::new(message, now);
        let handled = self.router.dispatch(&inbound);
        self.components.pump_entity_events();
        self.pump_connection_events();
        handled
    }

    /// Advances timers, zone effects, smoothing and projectiles by one frame.
    pub fn frame(&mut self, now: Instant, dt: f32) {
        self.connection.borrow_mut().poll(now);

        let local = self.local_status();
        let effects = self.components.zones.borrow_mut().poll(now, local);
        for effect in effects {
            match effect {
                ZoneEffect::Heal { amount, .. } => {
                    self.send_streaming(ClientMessage::Heal { amount }, now);
                }
                ZoneEffect::Damage { amount, .. } => {
                    self.send_streaming(ClientMessage::Damage { amount }, now);
                }
                ZoneEffect::Exited { zone_id } => {
                    self.components.notify(Notification::ZoneExited { zone_id });
                }
            }
        }

        self.components.players.borrow_mut().tick(dt);
        self.components.npcs.borrow_mut().tick(dt);
        self.components.projectiles.borrow_mut().tick(now, dt);
        self.components.pump_entity_events();
        self.pump_connection_events();
    }

    /// Predicts local movement and streams a position intent when one is due.
    pub fn move_local(&mut self, input: MoveInput, now: Instant, dt: f32) -> bool {
        let motion = self.components.players.borrow_mut().predict_local(input, dt);
        let Some(motion) = motion else {
            return false;
        };
        match self.input.position_intent(motion, now) {
            Some(intent) => self.send_streaming(intent, now),
            None => false,
        }
    }

    /// Sends an attack intent and inserts the optimistic projectile.
    pub fn attack(&mut self, direction: Vec2, now: Instant) -> bool {
        let local = {
            let players = self.components.players.borrow();
            players
                .local()
                .map(|player| (player.id.clone(), player.position, !player.is_dead))
        };
        let Some((owner, origin, alive)) = local else {
            debug!("Attack ignored, no local player");
            return false;
        };
        let Some(intent) = self.input.attack_intent(direction, alive, now) else {
            return false;
        };

        let sent = self.send(intent, now);
        if sent {
            self.components
                .projectiles
                .borrow_mut()
                .fire_local(&owner, origin, direction, now);
        }
        sent
    }

    /// Ready toggles are only sent while the room is waiting.
    pub fn toggle_ready(&mut self, now: Instant) -> bool {
        if !self.tracker.can_toggle_ready() {
            debug!("Ready toggle ignored in {}", self.tracker.phase());
            return false;
        }
        self.send(ClientMessage::ReadyToggle, now)
    }

    pub fn send_chat(&mut self, message: &str, now: Instant) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        self.send(
            ClientMessage::ChatMessage {
                message: message.to_string(),
                timestamp: unix_millis(),
            },
            now,
        )
    }

    pub fn damage_npc(&mut self, npc_id: &str, damage: i32, now: Instant) -> bool {
        self.send(
            ClientMessage::NpcDamage {
                npc_id: npc_id.to_string(),
                damage,
            },
            now,
        )
    }

    pub fn send(&mut self, message: ClientMessage, now: Instant) -> bool {
        self.connection.borrow_mut().send(message, now)
    }

    /// Continuous intents are only offered while open so a dropped socket is
    /// not hammered with reconnects at frame rate.
    fn send_streaming(&mut self, message: ClientMessage, now: Instant) -> bool {
        if !self.connection.borrow().is_open() {
            return false;
        }
        self.send(message, now)
    }

    /// The local player walked into a trigger area.
    pub fn enter_zone(&mut self, id: &str, kind: ZoneKind, geometry: ZoneGeometry, now: Instant) -> bool {
        self.components.zones.borrow_mut().start(id, kind, geometry, now)
    }

    pub fn leave_zone(&mut self, id: &str) -> bool {
        self.components.zones.borrow_mut().stop(id)
    }

    pub fn visibility_changed(&mut self, visible: bool, now: Instant) {
        self.connection.borrow_mut().on_visibility_change(visible, now);
    }

    pub fn transport_opened(&mut self, generation: u64, now: Instant) {
        self.connection.borrow_mut().on_open(generation, now);
        self.pump_connection_events();
    }

    pub fn transport_closed(&mut self, generation: u64, code: u16, now: Instant) {
        self.connection.borrow_mut().on_closed(generation, code, now);
        self.pump_connection_events();
    }

    pub fn transport_error(&mut self, generation: u64, message: &str, now: Instant) {
        self.connection.borrow_mut().on_error(generation, message, now);
        self.pump_connection_events();
    }

    pub fn drain_actions(&mut self) -> Vec<ConnectionAction> {
        self.connection.borrow_mut().drain_actions()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.components.notifications.borrow_mut().drain(..).collect()
    }

    /// Ends the session: handlers unregistered, entities and zones cleared,
    /// timers cancelled, phase back to waiting. A permanent teardown also
    /// shuts the connection manager down.
    pub fn teardown(&mut self, permanent: bool) {
        let handlers = self.subscriptions.len();
        self.subscriptions.clear();
        self.router.reset_all();

        let c = &self.components;
        c.players.borrow_mut().clear();
        c.npcs.borrow_mut().clear();
        c.players.borrow_mut().drain_events();
        c.npcs.borrow_mut().drain_events();
        c.projectiles.borrow_mut().clear();
        c.zones.borrow_mut().clear();
        c.round_reset_pending.set(false);

        self.tracker.reset();
        self.input.reset();

        {
            let mut connection = self.connection.borrow_mut();
            if permanent {
                connection.shutdown();
            } else {
                connection.disconnect();
            }
        }
        self.pump_connection_events();
        info!("Session torn down ({} handlers released)", handlers);
    }

    pub fn session(&self) -> Session {
        let connection = self.connection.borrow();
        Session {
            identity: connection.identity().to_string(),
            target_room: connection.target_room().to_string(),
            phase: self.tracker.phase(),
            connection_state: connection.state(),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.tracker.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<GamePhase> {
        self.tracker.subscribe()
    }

    pub fn tracker(&self) -> &SessionStateTracker {
        &self.tracker
    }

    pub fn connection(&self) -> ConnectionHandle {
        self.connection.clone()
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn players(&self) -> Ref<'_, EntityReconciler<PlayerKind>> {
        self.components.players.borrow()
    }

    pub fn npcs(&self) -> Ref<'_, EntityReconciler<NpcKind>> {
        self.components.npcs.borrow()
    }

    pub fn projectiles(&self) -> Ref<'_, ProjectileStore> {
        self.components.projectiles.borrow()
    }

    pub fn zones(&self) -> Ref<'_, ZoneSynchronizer> {
        self.components.zones.borrow()
    }

    /// True while any connection or zone timer is still armed.
    pub fn has_pending_timers(&self) -> bool {
        self.connection.borrow().next_deadline().is_some() || self.components.zones.borrow().timer_count() > 0
    }

    fn local_status(&self) -> Option<LocalStatus> {
        self.components.players.borrow().local().map(|player| LocalStatus {
            position: player.position,
            is_dead: player.is_dead,
        })
    }

    fn pump_connection_events(&mut self) {
        let events = self.connection.borrow_mut().drain_events();
        for event in events {
            let notification = match event {
                ConnectionEvent::StateChanged(state) => Notification::ConnectionState(state),
                ConnectionEvent::ReconnectScheduled { attempt } => {
                    debug!("Reconnect attempt {} scheduled", attempt);
                    continue;
                }
                ConnectionEvent::ReconnectExhausted { attempts } => Notification::ReconnectExhausted { attempts },
                ConnectionEvent::RoomShutdown { reason } => Notification::RoomShutdown { reason },
                ConnectionEvent::Rejected { reason, message } => {
                    Notification::ConnectionRejected { reason, message }
                }
            };
            self.components.notify(notification);
        }
    }
}
