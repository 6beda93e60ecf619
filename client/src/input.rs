//! Turns local input samples into throttled outbound intents

use crate::config::InputConfig;
use crate::entity::LocalMotion;
use shared::{ClientMessage, Vec2};
use std::time::{Duration, Instant};

/// Rate-limits the intents produced from local input
pub struct InputManager {
    position_interval: Duration,
    attack_cooldown: Duration,
    last_position_sent: Option<Instant>,
    last_motion_sent: Option<LocalMotion>,
    last_attack: Option<Instant>,
}

impl InputManager {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            position_interval: config.position_interval,
            attack_cooldown: config.attack_cooldown,
            last_position_sent: None,
            last_motion_sent: None,
            last_attack: None,
        }
    }

    /// Returns a position intent if the send interval has passed and the
    /// motion changed or the player is still moving
    pub fn position_intent(&mut self, motion: LocalMotion, now: Instant) -> Option<ClientMessage> {
        let due = self
            .last_position_sent
            .map_or(true, |sent| now.saturating_duration_since(sent) >= self.position_interval);
        if !due {
            return None;
        }

        let changed = self.last_motion_sent != Some(motion);
        let moving = motion.velocity != Vec2::ZERO;
        if !changed && !moving {
            return None;
        }

        self.last_position_sent = Some(now);
        self.last_motion_sent = Some(motion);

        Some(ClientMessage::Position {
            x: motion.position.x,
            y: motion.position.y,
            vx: motion.velocity.x,
            vy: motion.velocity.y,
            flip_x: motion.flip_x,
        })
    }

    /// Returns an attack intent unless the player is dead, the direction is
    /// empty, or the cooldown is still running
    pub fn attack_intent(&mut self, direction: Vec2, alive: bool, now: Instant) -> Option<ClientMessage> {
        if !alive {
            return None;
        }

        let direction = direction.normalized();
        if direction == Vec2::ZERO {
            return None;
        }

        if let Some(last) = self.last_attack {
            if now.saturating_duration_since(last) < self.attack_cooldown {
                return None;
            }
        }

        self.last_attack = Some(now);
        Some(ClientMessage::Attack {
            direction_x: direction.x,
            direction_y: direction.y,
        })
    }

    pub fn reset(&mut self) {
        self.last_position_sent = None;
        self.last_motion_sent = None;
        self.last_attack = None;
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new(&InputConfig::default())
    }
}
