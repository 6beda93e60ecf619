//! Connection lifecycle as a sans-IO state machine.
//!
//! [`ConnectionManager`] never touches a socket. It is fed transport events
//! (`on_open`, `on_closed`, `on_error`) and the current time, and it queues
//! [`ConnectionAction`]s for the driver to carry out. Every attempt gets a new
//! generation number so late events from an abandoned socket are ignored.
//!
//! Reconnection is bounded and uses a fixed delay. Two kinds of shutdown
//! suppress it: the permanent one requested by the owner through
//! [`ConnectionManager::shutdown`], and the transient one the server asks for
//! with `room_shutdown`, which clears itself after a grace period.

use crate::config::ConnectionConfig;
use crate::error::SyncError;
use crate::timers::TimerRegistry;
use log::{debug, error, info, warn};
use shared::{encode, ClientMessage, NORMAL_CLOSURE};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Reconnecting,
    ShuttingDown,
}

/// Work for the transport driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    Open { generation: u64, url: String },
    /// Graceful close handshake.
    Close {
        generation: u64,
        code: u16,
        reason: String,
    },
    /// Drop the socket without a handshake.
    Abort { generation: u64 },
    Transmit { generation: u64, frame: String },
}

/// Lifecycle notices for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    ReconnectScheduled { attempt: u32 },
    ReconnectExhausted { attempts: u32 },
    RoomShutdown { reason: String },
    Rejected {
        reason: String,
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConnectionTimer {
    ConnectTimeout,
    Reconnect,
    Heartbeat,
    VisibilityReconnect,
    TransientShutdown,
}

pub struct ConnectionManager {
    config: ConnectionConfig,
    identity: String,
    target_room: String,
    state: ConnectionState,
    generation: u64,
    active: Option<u64>,
    reconnect_attempts: u32,
    shutting_down: bool,
    transient_shutdown: bool,
    timers: TimerRegistry<ConnectionTimer>,
    actions: VecDeque<ConnectionAction>,
    events: VecDeque<ConnectionEvent>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            identity: String::new(),
            target_room: String::new(),
            state: ConnectionState::Closed,
            generation: 0,
            active: None,
            reconnect_attempts: 0,
            shutting_down: false,
            transient_shutdown: false,
            timers: TimerRegistry::new(),
            actions: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Starts a connection attempt unless one is already open or in flight.
    pub fn connect(&mut self, identity: &str, target_room: &str, now: Instant) -> Result<(), SyncError> {
        if matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            debug!("Connect ignored, connection is {:?}", self.state);
            return Ok(());
        }
        if identity.trim().is_empty() {
            warn!("Cannot connect without an identity");
            return Err(SyncError::MissingIdentity);
        }
        if self.shutting_down {
            warn!("Connect refused while shutting down");
            return Err(SyncError::ShuttingDown);
        }

        self.identity = identity.to_string();
        self.target_room = target_room.to_string();
        self.reconnect_attempts = 0;
        self.timers.cancel(&ConnectionTimer::Reconnect);
        self.timers.cancel(&ConnectionTimer::VisibilityReconnect);
        self.open_socket(now);
        Ok(())
    }

    /// Closes the connection on purpose. No reconnection follows.
    pub fn disconnect(&mut self) {
        self.timers.cancel(&ConnectionTimer::ConnectTimeout);
        self.timers.cancel(&ConnectionTimer::Reconnect);
        self.timers.cancel(&ConnectionTimer::Heartbeat);
        self.timers.cancel(&ConnectionTimer::VisibilityReconnect);
        self.reconnect_attempts = 0;

        if let Some(generation) = self.active.take() {
            info!("Disconnecting");
            self.actions.push_back(ConnectionAction::Close {
                generation,
                code: NORMAL_CLOSURE,
                reason: "Normal closure".to_string(),
            });
        }

        let resting = if self.shutting_down {
            ConnectionState::ShuttingDown
        } else {
            ConnectionState::Closed
        };
        self.set_state(resting);
    }

    /// Disconnects for good. Every timer is cancelled and nothing reconnects
    /// until [`reset_shutdown`](Self::reset_shutdown).
    pub fn shutdown(&mut self) {
        info!("Shutting down connection manager");
        self.shutting_down = true;
        self.transient_shutdown = false;
        self.disconnect();
        self.timers.clear();
    }

    pub fn reset_shutdown(&mut self) {
        self.shutting_down = false;
        if self.state == ConnectionState::ShuttingDown {
            self.set_state(ConnectionState::Closed);
        }
    }

    /// Server-initiated room reset. Closes now and holds off reconnection for
    /// the configured grace period.
    pub fn handle_room_shutdown(&mut self, reason: &str, now: Instant) {
        info!("Room shutdown: {}", reason);
        self.disconnect();
        if !self.shutting_down {
            self.transient_shutdown = true;
            self.timers
                .arm_once(ConnectionTimer::TransientShutdown, now, self.config.room_shutdown_grace);
        }
        self.events.push_back(ConnectionEvent::RoomShutdown {
            reason: reason.to_string(),
        });
    }

    /// Capacity or identity rejection. Returns to a closed state without retrying.
    pub fn handle_connection_failed(&mut self, reason: &str, message: Option<&str>) {
        warn!("Server rejected connection: {} ({})", reason, message.unwrap_or("no details"));
        self.disconnect();
        self.events.push_back(ConnectionEvent::Rejected {
            reason: reason.to_string(),
            message: message.map(str::to_string),
        });
    }

    pub fn on_open(&mut self, generation: u64, now: Instant) {
        if self.active != Some(generation) || self.state != ConnectionState::Connecting {
            debug!("Ignoring open from stale connection {}", generation);
            return;
        }

        self.timers.cancel(&ConnectionTimer::ConnectTimeout);
        self.reconnect_attempts = 0;
        self.set_state(ConnectionState::Open);
        info!("Connected as {} to {}", self.identity, self.target_room);

        self.start_heartbeat(now);
        let join = ClientMessage::JoinGame {
            map: self.target_room.clone(),
        };
        self.send(join, now);
    }

    pub fn on_closed(&mut self, generation: u64, code: u16, now: Instant) {
        if self.active != Some(generation) {
            debug!("Ignoring close from stale connection {}", generation);
            return;
        }
        self.active = None;
        self.stop_liveness();

        if code == NORMAL_CLOSURE {
            info!("Connection closed normally");
            let resting = if self.shutting_down {
                ConnectionState::ShuttingDown
            } else {
                ConnectionState::Closed
            };
            self.set_state(resting);
            return;
        }

        warn!("Connection closed abnormally (code {})", code);
        self.schedule_reconnect(now);
    }

    /// Transport errors take the same path as an abnormal close.
    pub fn on_error(&mut self, generation: u64, message: &str, now: Instant) {
        if self.active != Some(generation) {
            debug!("Ignoring error from stale connection {}: {}", generation, message);
            return;
        }
        warn!("Connection error: {}", message);
        self.active = None;
        self.stop_liveness();
        self.actions.push_back(ConnectionAction::Abort { generation });
        self.schedule_reconnect(now);
    }

    /// Host window visibility changed. Becoming visible while disconnected
    /// schedules one reconnect after a short delay. Repeated events re-arm the
    /// same timer.
    pub fn on_visibility_change(&mut self, visible: bool, now: Instant) {
        if !visible {
            self.timers.cancel(&ConnectionTimer::VisibilityReconnect);
            return;
        }
        if !self.may_reconnect() {
            debug!("Visibility recovery not needed ({:?})", self.state);
            return;
        }
        self.timers.arm_once(
            ConnectionTimer::VisibilityReconnect,
            now,
            self.config.visibility_reconnect_delay,
        );
    }

    /// Queues an intent for transmission with the identity attached.
    ///
    /// When the connection is not open the intent is dropped, a reconnect is
    /// started instead, and `false` is returned.
    pub fn send(&mut self, message: ClientMessage, now: Instant) -> bool {
        let generation = match (self.state, self.active) {
            (ConnectionState::Open, Some(generation)) => generation,
            _ => {
                warn!("Dropping {} intent, connection is {:?}", message.type_name(), self.state);
                self.heal(now);
                return false;
            }
        };

        match encode(&message, &self.identity) {
            Ok(frame) => {
                self.actions.push_back(ConnectionAction::Transmit { generation, frame });
                true
            }
            Err(e) => {
                warn!("Failed to encode {} intent: {}", message.type_name(), e);
                false
            }
        }
    }

    /// Fires due timers.
    pub fn poll(&mut self, now: Instant) {
        for timer in self.timers.poll(now) {
            match timer {
                ConnectionTimer::ConnectTimeout => {
                    if self.state != ConnectionState::Connecting {
                        continue;
                    }
                    if let Some(generation) = self.active.take() {
                        warn!("Connection attempt {} timed out", generation);
                        self.actions.push_back(ConnectionAction::Abort { generation });
                        self.stop_liveness();
                        self.schedule_reconnect(now);
                    }
                }
                ConnectionTimer::Reconnect => {
                    if self.state == ConnectionState::Reconnecting && !self.suppressed() {
                        self.open_socket(now);
                    }
                }
                ConnectionTimer::Heartbeat => {
                    if self.state == ConnectionState::Open {
                        self.send(ClientMessage::Heartbeat { timestamp: unix_millis() }, now);
                    }
                }
                ConnectionTimer::VisibilityReconnect => {
                    if self.may_reconnect() {
                        info!("Window visible again, reconnecting");
                        self.timers.cancel(&ConnectionTimer::Reconnect);
                        self.open_socket(now);
                    }
                }
                ConnectionTimer::TransientShutdown => {
                    self.transient_shutdown = false;
                    info!("Room shutdown grace period over");
                }
            }
        }
    }

    pub fn drain_actions(&mut self) -> Vec<ConnectionAction> {
        self.actions.drain(..).collect()
    }

    pub fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        self.events.drain(..).collect()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn target_room(&self) -> &str {
        &self.target_room
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn is_transient_shutdown(&self) -> bool {
        self.transient_shutdown
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn url(&self) -> String {
        let separator = if self.config.server_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}token={}&map={}",
            self.config.server_url,
            separator,
            encode_query_value(&self.identity),
            encode_query_value(&self.target_room)
        )
    }

    fn open_socket(&mut self, now: Instant) {
        self.generation += 1;
        self.active = Some(self.generation);
        self.set_state(ConnectionState::Connecting);

        let url = self.url();
        info!("Opening connection {} to {}", self.generation, url);
        self.actions.push_back(ConnectionAction::Open {
            generation: self.generation,
            url,
        });
        self.timers
            .arm_once(ConnectionTimer::ConnectTimeout, now, self.config.connection_timeout);
    }

    fn start_heartbeat(&mut self, now: Instant) {
        self.timers.cancel(&ConnectionTimer::Heartbeat);
        self.timers
            .arm_interval(ConnectionTimer::Heartbeat, now, self.config.heartbeat_interval);
    }

    fn stop_liveness(&mut self) {
        self.timers.cancel(&ConnectionTimer::ConnectTimeout);
        self.timers.cancel(&ConnectionTimer::Heartbeat);
    }

    fn suppressed(&self) -> bool {
        self.shutting_down || self.transient_shutdown
    }

    fn may_reconnect(&self) -> bool {
        !self.suppressed()
            && !self.identity.is_empty()
            && !matches!(self.state, ConnectionState::Open | ConnectionState::Connecting)
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if self.shutting_down {
            self.set_state(ConnectionState::ShuttingDown);
            return;
        }
        if self.transient_shutdown {
            info!("Reconnection suppressed during room shutdown");
            self.set_state(ConnectionState::Closed);
            return;
        }
        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            error!(
                "Max reconnection attempts ({}) reached",
                self.config.max_reconnect_attempts
            );
            self.set_state(ConnectionState::Closed);
            self.events.push_back(ConnectionEvent::ReconnectExhausted {
                attempts: self.reconnect_attempts,
            });
            return;
        }

        self.reconnect_attempts += 1;
        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            self.config.reconnect_delay, self.reconnect_attempts, self.config.max_reconnect_attempts
        );
        self.timers
            .arm_once(ConnectionTimer::Reconnect, now, self.config.reconnect_delay);
        self.set_state(ConnectionState::Reconnecting);
        self.events.push_back(ConnectionEvent::ReconnectScheduled {
            attempt: self.reconnect_attempts,
        });
    }

    /// A failed send restarts the connection right away.
    fn heal(&mut self, now: Instant) {
        if !self.may_reconnect() {
            return;
        }
        info!("Send attempted while {:?}, reconnecting", self.state);
        self.timers.cancel(&ConnectionTimer::Reconnect);
        self.open_socket(now);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!("Connection state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.events.push_back(ConnectionEvent::StateChanged(state));
    }
}

/// Cloneable handle to the one connection manager of a session.
#[derive(Clone)]
pub struct ConnectionHandle(Rc<RefCell<ConnectionManager>>);

impl ConnectionHandle {
    pub fn new(manager: ConnectionManager) -> Self {
        Self(Rc::new(RefCell::new(manager)))
    }

    pub fn borrow(&self) -> Ref<'_, ConnectionManager> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ConnectionManager> {
        self.0.borrow_mut()
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
