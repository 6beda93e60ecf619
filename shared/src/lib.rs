//! Wire protocol and game constants shared by every part of the arena client.
//!
//! Frames are JSON text objects with a `type` discriminator. Inbound frames are
//! decoded into [`protocol::ServerMessage`], outbound intents are expressed as
//! [`protocol::ClientMessage`].

pub mod protocol;

pub use protocol::{
    decode, encode, ClientMessage, GamePhase, MessageKind, NpcBehavior, ProtocolError,
    ServerMessage,
};

use serde::{Deserialize, Serialize};

pub const MAX_HEALTH: i32 = 4;
pub const PLAYER_SPEED: f32 = 100.0;
pub const PROJECTILE_SPEED: f32 = 400.0;
pub const PROJECTILE_LIFETIME_MS: u64 = 1000;
pub const NPC_ID_PREFIX: &str = "npc_";
pub const NORMAL_CLOSURE: u16 = 1000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero-length input.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len < f32::EPSILON {
            return Vec2::ZERO;
        }
        Vec2::new(self.x / len, self.y / len)
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, target: Vec2, alpha: f32) -> Vec2 {
        Vec2::new(
            self.x + (target.x - self.x) * alpha,
            self.y + (target.y - self.y) * alpha,
        )
    }

    pub fn scaled(&self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn offset(&self, delta: Vec2) -> Vec2 {
        Vec2::new(self.x + delta.x, self.y + delta.y)
    }
}

/// Owner ids with the NPC prefix belong to server-controlled enemies.
pub fn is_npc_id(id: &str) -> bool {
    id.starts_with(NPC_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vec2_normalized_diagonal() {
        let v = Vec2::new(1.0, 1.0).normalized();
        assert_approx_eq!(v.length(), 1.0);
        assert_approx_eq!(v.x, std::f32::consts::FRAC_1_SQRT_2);
    }

    #[test]
    fn test_vec2_normalized_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_vec2_lerp() {
        let v = Vec2::new(0.0, 0.0).lerp(Vec2::new(10.0, -10.0), 0.2);
        assert_approx_eq!(v.x, 2.0);
        assert_approx_eq!(v.y, -2.0);
    }

    #[test]
    fn test_vec2_distance() {
        assert_approx_eq!(Vec2::new(0.0, 0.0).distance(Vec2::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_npc_id_prefix() {
        assert!(is_npc_id("npc_7"));
        assert!(!is_npc_id("alice"));
        assert!(!is_npc_id("npc"));
    }
}
