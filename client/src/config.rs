//! Tunables for the synchronization core.
//!
//! Interval lengths and zone thresholds are hand-tuned values, not protocol
//! invariants, so they all live here with their defaults.

use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8081/game";
pub const DEFAULT_MAP: &str = "map1";

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub server_url: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub connection_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// How long a server-initiated room shutdown suppresses reconnection.
    pub room_shutdown_grace: Duration,
    pub visibility_reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(3000),
            connection_timeout: Duration::from_millis(5000),
            heartbeat_interval: Duration::from_secs(30),
            room_shutdown_grace: Duration::from_secs(2),
            visibility_reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub fn with_room_shutdown_grace(mut self, grace: Duration) -> Self {
        self.room_shutdown_grace = grace;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// Fraction of the remaining distance covered per 60 Hz frame.
    pub smoothing_factor: f32,
    pub player_speed: f32,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.2,
            player_speed: shared::PLAYER_SPEED,
        }
    }
}

impl EntityConfig {
    #[must_use]
    pub fn with_smoothing_factor(mut self, factor: f32) -> Self {
        self.smoothing_factor = factor.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProjectileConfig {
    pub speed: f32,
    pub lifetime: Duration,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            speed: shared::PROJECTILE_SPEED,
            lifetime: Duration::from_millis(shared::PROJECTILE_LIFETIME_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZoneConfig {
    pub heal_interval: Duration,
    pub heal_amount: i32,
    pub damage_interval: Duration,
    pub damage_amount: i32,
    pub exit_check_interval: Duration,
    pub min_shrink_delta: f32,
    pub min_shrink_interval: Duration,
    pub min_change_delta: f32,
    pub min_change_interval: Duration,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            heal_interval: Duration::from_millis(3000),
            heal_amount: 1,
            damage_interval: Duration::from_millis(600),
            damage_amount: 1,
            exit_check_interval: Duration::from_millis(100),
            min_shrink_delta: 15.0,
            min_shrink_interval: Duration::from_millis(3000),
            min_change_delta: 30.0,
            min_change_interval: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputConfig {
    pub position_interval: Duration,
    pub attack_cooldown: Duration,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            position_interval: Duration::from_millis(1000 / 60),
            attack_cooldown: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    pub connection: ConnectionConfig,
    pub entities: EntityConfig,
    pub projectiles: ProjectileConfig,
    pub zones: ZoneConfig,
    pub input: InputConfig,
}

impl SyncConfig {
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    #[must_use]
    pub fn with_entities(mut self, entities: EntityConfig) -> Self {
        self.entities = entities;
        self
    }

    #[must_use]
    pub fn with_zones(mut self, zones: ZoneConfig) -> Self {
        self.zones = zones;
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.server_url, "ws://localhost:8081/game");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(config.connection_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_zone_defaults() {
        let config = ZoneConfig::default();
        assert_eq!(config.heal_interval, Duration::from_millis(3000));
        assert_eq!(config.damage_interval, Duration::from_millis(600));
        assert_eq!(config.exit_check_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_builders_chain() {
        let config = SyncConfig::default().with_connection(
            ConnectionConfig::default()
                .with_server_url("ws://example.test/game")
                .with_max_reconnect_attempts(2),
        );
        assert_eq!(config.connection.server_url, "ws://example.test/game");
        assert_eq!(config.connection.max_reconnect_attempts, 2);
    }

    #[test]
    fn test_smoothing_factor_clamped() {
        let config = EntityConfig::default().with_smoothing_factor(3.0);
        assert_eq!(config.smoothing_factor, 1.0);
    }
}
