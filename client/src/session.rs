//! Room life-cycle tracking.
//!
//! No single message carries the phase at all times, so the tracker rebuilds
//! it from the stream: `room_status` states it outright, the countdown and
//! game messages imply it, and everything else leaves it alone.

use crate::connection::ConnectionState;
use log::{debug, info};
use shared::protocol::{GameEnded, RoomStatus};
use shared::{GamePhase, ServerMessage};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: GamePhase,
    pub to: GamePhase,
}

/// Snapshot of who this client is and where the session stands.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: String,
    pub target_room: String,
    pub phase: GamePhase,
    pub connection_state: ConnectionState,
}

#[derive(Debug)]
pub struct SessionStateTracker {
    phase: GamePhase,
    phase_tx: watch::Sender<GamePhase>,
    countdown_seconds: Option<u32>,
    time_remaining_ms: Option<u64>,
    time_elapsed_ms: Option<u64>,
    room: Option<RoomStatus>,
    result: Option<GameEnded>,
}

impl SessionStateTracker {
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(GamePhase::Waiting);
        Self {
            phase: GamePhase::Waiting,
            phase_tx,
            countdown_seconds: None,
            time_remaining_ms: None,
            time_elapsed_ms: None,
            room: None,
            result: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Receivers see the current phase immediately and every change after it.
    pub fn subscribe(&self) -> watch::Receiver<GamePhase> {
        self.phase_tx.subscribe()
    }

    /// Folds one inbound message into the tracker. Returns the transition
    /// when the phase actually changed.
    pub fn observe(&mut self, message: &ServerMessage) -> Option<PhaseTransition> {
        let next = match message {
            ServerMessage::RoomStatus(status) => {
                self.room = Some(status.clone());
                status.game_state
            }
            ServerMessage::CountdownStarted(countdown) => {
                self.countdown_seconds = Some(countdown.duration);
                GamePhase::Countdown
            }
            ServerMessage::Countdown(tick) => {
                self.countdown_seconds = Some(tick.seconds);
                return None;
            }
            ServerMessage::CountdownCancelled => {
                self.countdown_seconds = None;
                GamePhase::Waiting
            }
            ServerMessage::GameStarted(started) => {
                self.countdown_seconds = None;
                self.result = None;
                self.time_elapsed_ms = Some(0);
                self.time_remaining_ms = started.game_duration;
                GamePhase::Playing
            }
            ServerMessage::TimeRemaining(time) => {
                self.time_remaining_ms = Some(time.time_remaining);
                self.time_elapsed_ms = Some(time.time_elapsed);
                return None;
            }
            ServerMessage::GameEnded(ended) => {
                self.result = Some(ended.clone());
                GamePhase::Finished
            }
            _ => return None,
        };

        self.transition_to(next)
    }

    fn transition_to(&mut self, next: GamePhase) -> Option<PhaseTransition> {
        if next == self.phase {
            debug!("Phase stays {}", next);
            return None;
        }

        let transition = PhaseTransition {
            from: self.phase,
            to: next,
        };
        info!("Room phase {} -> {}", transition.from, transition.to);
        self.phase = next;
        self.phase_tx.send_replace(next);
        Some(transition)
    }

    pub fn countdown_seconds(&self) -> Option<u32> {
        self.countdown_seconds
    }

    pub fn time_remaining_ms(&self) -> Option<u64> {
        self.time_remaining_ms
    }

    pub fn time_elapsed_ms(&self) -> Option<u64> {
        self.time_elapsed_ms
    }

    pub fn room(&self) -> Option<&RoomStatus> {
        self.room.as_ref()
    }

    pub fn result(&self) -> Option<&GameEnded> {
        self.result.as_ref()
    }

    /// Ready toggles are only meaningful in the lobby.
    pub fn can_toggle_ready(&self) -> bool {
        self.phase == GamePhase::Waiting
    }

    /// Back to a fresh lobby. Subscribers are notified if the phase moves.
    pub fn reset(&mut self) {
        self.countdown_seconds = None;
        self.time_remaining_ms = None;
        self.time_elapsed_ms = None;
        self.room = None;
        self.result = None;
        self.transition_to(GamePhase::Waiting);
    }
}

impl Default for SessionStateTracker {
    fn default() -> Self {
        Self::new()
    }
}
