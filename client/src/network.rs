use crate::config::SyncConfig;
use crate::connection::ConnectionAction;
use crate::entity::MoveInput;
use crate::error::SyncError;
use crate::game::{GameSync, Notification};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::Vec2;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Close code reported when a socket ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Things the local player asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Held movement. A zero direction stops.
    Move(MoveInput),
    Attack(Vec2),
    Chat(String),
    ReadyToggle,
    Visibility(bool),
    Quit,
}

/// Socket lifecycle as seen by a transport task, tagged with its generation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened(u64),
    Frame(u64, String),
    Closed(u64, u16),
    Errored(u64, String),
}

/// How a session run ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Quit,
    RoomShutdown { reason: String },
}

struct Transport {
    outgoing: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

/// Drives a [`GameSync`] over real WebSockets.
pub struct Client {
    sync: GameSync,
    identity: String,
    room: String,

    transports: HashMap<u64, Transport>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    intents_tx: mpsc::UnboundedSender<Intent>,
    intents_rx: mpsc::UnboundedReceiver<Intent>,

    held_input: MoveInput,
    frame_interval: Duration,
}

impl Client {
    pub fn new(config: SyncConfig, identity: &str, room: &str) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();

        Client {
            sync: GameSync::new(config),
            identity: identity.to_string(),
            room: room.to_string(),
            transports: HashMap::new(),
            events_tx,
            events_rx,
            intents_tx,
            intents_rx,
            held_input: MoveInput::default(),
            frame_interval: Duration::from_millis(16),
        }
    }

    #[must_use]
    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval.max(Duration::from_millis(1));
        self
    }

    /// Sender for feeding player intents into a running client.
    pub fn intents(&self) -> mpsc::UnboundedSender<Intent> {
        self.intents_tx.clone()
    }

    pub fn sync(&self) -> &GameSync {
        &self.sync
    }

    pub async fn run(&mut self) -> Result<SessionEnd, SyncError> {
        self.sync.start_session(&self.identity, &self.room, Instant::now())?;
        self.apply_actions();

        let mut frame_interval = interval(self.frame_interval);
        let mut last_frame = Instant::now();

        let outcome = loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    self.handle_transport(event);
                },

                Some(intent) = self.intents_rx.recv() => {
                    if intent == Intent::Quit {
                        info!("Quit requested");
                        break Ok(SessionEnd::Quit);
                    }
                    self.handle_intent(intent);
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    if self.held_input.direction != Vec2::ZERO {
                        self.sync.move_local(self.held_input, now, dt);
                    }
                    self.sync.frame(now, dt);
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break Ok(SessionEnd::Quit);
                },
            }

            self.apply_actions();
            if let Some(outcome) = self.process_notifications() {
                break outcome;
            }
        };

        self.sync.teardown(true);
        self.apply_actions();
        self.close_all().await;
        outcome
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        let now = Instant::now();
        match event {
            TransportEvent::Opened(generation) => self.sync.transport_opened(generation, now),
            TransportEvent::Frame(generation, frame) => {
                if self.sync.connection().borrow().active_generation() != Some(generation) {
                    debug!("Dropping frame from stale connection {}", generation);
                    return;
                }
                // Decode failures are already logged and dropped.
                let _ = self.sync.handle_frame(&frame, now);
            }
            TransportEvent::Closed(generation, code) => {
                self.transports.remove(&generation);
                self.sync.transport_closed(generation, code, now);
            }
            TransportEvent::Errored(generation, message) => {
                if let Some(transport) = self.transports.remove(&generation) {
                    transport.task.abort();
                }
                self.sync.transport_error(generation, &message, now);
            }
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        let now = Instant::now();
        match intent {
            Intent::Move(input) => self.held_input = input,
            Intent::Attack(direction) => {
                self.sync.attack(direction, now);
            }
            Intent::Chat(message) => {
                self.sync.send_chat(&message, now);
            }
            Intent::ReadyToggle => {
                if !self.sync.toggle_ready(now) {
                    info!("Ready toggle is only available while waiting");
                }
            }
            Intent::Visibility(visible) => self.sync.visibility_changed(visible, now),
            Intent::Quit => {}
        }
    }

    fn apply_actions(&mut self) {
        for action in self.sync.drain_actions() {
            match action {
                ConnectionAction::Open { generation, url } => {
                    info!("Opening connection {} to {}", generation, url);
                    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
                    let task = tokio::spawn(run_transport(generation, url, outgoing_rx, self.events_tx.clone()));
                    self.transports.insert(generation, Transport { outgoing, task });
                }
                ConnectionAction::Transmit { generation, frame } => match self.transports.get(&generation) {
                    Some(transport) => {
                        if transport.outgoing.send(Message::Text(frame)).is_err() {
                            warn!("Connection {} writer already gone", generation);
                        }
                    }
                    None => warn!("No transport for connection {}", generation),
                },
                ConnectionAction::Close {
                    generation,
                    code,
                    reason,
                } => {
                    if let Some(transport) = self.transports.remove(&generation) {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = transport.outgoing.send(Message::Close(Some(frame)));
                    }
                }
                ConnectionAction::Abort { generation } => {
                    if let Some(transport) = self.transports.remove(&generation) {
                        debug!("Aborting connection {}", generation);
                        transport.task.abort();
                    }
                }
            }
        }
    }

    /// Logs what happened this iteration. Returns an outcome when the session
    /// cannot continue.
    fn process_notifications(&mut self) -> Option<Result<SessionEnd, SyncError>> {
        for notification in self.sync.drain_notifications() {
            match notification {
                Notification::PhaseChanged(transition) => {
                    info!("Phase {} -> {}", transition.from, transition.to);
                }
                Notification::ConnectionState(state) => debug!("Connection {:?}", state),
                Notification::PlayerJoined { id } => info!("{} joined", id),
                Notification::PlayerLeft { id } => info!("{} left", id),
                Notification::PlayerDied { id } => info!("{} died", id),
                Notification::NpcDied { id } => info!("{} defeated", id),
                Notification::NpcRemoved { id } => debug!("{} removed", id),
                Notification::SkinChanged { id, skin } => debug!("{} now wears {}", id, skin),
                Notification::Chat { from, message, .. } => info!("[{}] {}", from, message),
                Notification::GameEnded(ended) => {
                    info!("Game ended: {}", ended.reason);
                    for ranking in &ended.stats.rankings {
                        info!("  #{} {} ({} kills)", ranking.rank, ranking.player_id, ranking.kills);
                    }
                }
                Notification::ZoneExited { zone_id } => debug!("Left zone {}", zone_id),
                Notification::RoomShutdown { reason } => {
                    return Some(Ok(SessionEnd::RoomShutdown { reason }));
                }
                Notification::ConnectionRejected { reason, message } => {
                    error!("Connection rejected: {}", reason);
                    return Some(Err(SyncError::Rejected { reason, message }));
                }
                Notification::ReconnectExhausted { attempts } => {
                    error!("Giving up after {} reconnect attempts", attempts);
                    return Some(Err(SyncError::Transport(format!(
                        "reconnect failed after {} attempts",
                        attempts
                    ))));
                }
            }
        }
        None
    }

    /// Lets writers flush their close frames before the runtime goes away.
    async fn close_all(&mut self) {
        for (generation, transport) in self.transports.drain() {
            drop(transport.outgoing);
            if timeout(Duration::from_millis(250), transport.task).await.is_err() {
                debug!("Connection {} did not finish closing", generation);
            }
        }
    }
}

async fn run_transport(
    generation: u64,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let (ws_stream, _) = match connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("Failed to connect: {}", e);
            let _ = events.send(TransportEvent::Errored(generation, e.to_string()));
            return;
        }
    };
    let _ = events.send(TransportEvent::Opened(generation));

    let (mut write, mut read) = ws_stream.split();
    let reader_events = events.clone();
    let reader = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let _ = reader_events.send(TransportEvent::Frame(generation, text));
                }
                Ok(Message::Close(frame)) => {
                    let code = frame.map_or(ABNORMAL_CLOSURE, |frame| u16::from(frame.code));
                    let _ = reader_events.send(TransportEvent::Closed(generation, code));
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = reader_events.send(TransportEvent::Errored(generation, e.to_string()));
                    return;
                }
            }
        }
        let _ = reader_events.send(TransportEvent::Closed(generation, ABNORMAL_CLOSURE));
    });

    while let Some(message) = outgoing.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = write.send(message).await {
            error!("Failed to send message: {}", e);
            let _ = events.send(TransportEvent::Errored(generation, e.to_string()));
            break;
        }
        if closing {
            break;
        }
    }

    debug!("Writer for connection {} ended", generation);
    reader.abort();
}
