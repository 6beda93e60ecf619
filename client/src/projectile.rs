//! Short-lived projectiles.
//!
//! Projectiles come from the server (`projectile_created`) or from a local
//! fire intent inserted optimistically. Either way they are dropped on an
//! explicit removal or once their lifetime runs out, whichever comes first.

use crate::config::ProjectileConfig;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::protocol::ProjectileCreated;
use shared::{is_npc_id, Vec2};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: String,
    pub owner_id: String,
    pub origin: Vec2,
    pub direction: Vec2,
    pub position: Vec2,
    pub created_at: Instant,
    pub is_npc_owned: bool,
    /// Inserted locally ahead of the server's confirmation.
    pub optimistic: bool,
}

pub struct ProjectileStore {
    projectiles: HashMap<String, Projectile>,
    speed: f32,
    lifetime: Duration,
}

impl ProjectileStore {
    pub fn new(config: &ProjectileConfig) -> Self {
        Self {
            projectiles: HashMap::new(),
            speed: config.speed,
            lifetime: config.lifetime,
        }
    }

    /// Inserts a server-announced projectile.
    ///
    /// A projectile fired by the local player replaces that player's oldest
    /// optimistic copy so the shot is not drawn twice.
    pub fn spawn_remote(&mut self, created: &ProjectileCreated, local_identity: Option<&str>, now: Instant) -> bool {
        if self.projectiles.contains_key(&created.id) {
            debug!("Projectile {} already tracked", created.id);
            return false;
        }

        if local_identity == Some(created.owner_id.as_str()) {
            let oldest = self
                .projectiles
                .values()
                .filter(|p| p.optimistic && p.owner_id == created.owner_id)
                .min_by_key(|p| p.created_at)
                .map(|p| p.id.clone());
            if let Some(oldest) = oldest {
                debug!("Server confirmed local shot {} as {}", oldest, created.id);
                self.projectiles.remove(&oldest);
            }
        }

        let origin = Vec2::new(created.x, created.y);
        let projectile = Projectile {
            id: created.id.clone(),
            owner_id: created.owner_id.clone(),
            origin,
            direction: Vec2::new(created.direction_x, created.direction_y).normalized(),
            position: origin,
            created_at: now,
            is_npc_owned: created.is_npc.unwrap_or_else(|| is_npc_id(&created.owner_id)),
            optimistic: false,
        };
        self.projectiles.insert(projectile.id.clone(), projectile);
        true
    }

    /// Optimistic local insert. Returns the generated id.
    pub fn fire_local(&mut self, owner_id: &str, origin: Vec2, direction: Vec2, now: Instant) -> String {
        let id = Self::generate_id();
        let projectile = Projectile {
            id: id.clone(),
            owner_id: owner_id.to_string(),
            origin,
            direction: direction.normalized(),
            position: origin,
            created_at: now,
            is_npc_owned: is_npc_id(owner_id),
            optimistic: true,
        };
        self.projectiles.insert(id.clone(), projectile);
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Projectile> {
        self.projectiles.remove(id)
    }

    /// Moves every projectile and purges the ones past their lifetime.
    /// Returns the purged ids.
    pub fn tick(&mut self, now: Instant, dt: f32) -> Vec<String> {
        let step = self.speed * dt.max(0.0);
        for projectile in self.projectiles.values_mut() {
            projectile.position = projectile.position.offset(projectile.direction.scaled(step));
        }

        let lifetime = self.lifetime;
        let expired: Vec<String> = self
            .projectiles
            .values()
            .filter(|p| now.saturating_duration_since(p.created_at) >= lifetime)
            .map(|p| p.id.clone())
            .collect();

        for id in &expired {
            self.projectiles.remove(id);
        }
        if !expired.is_empty() {
            debug!("Expired {} projectile(s)", expired.len());
        }
        expired
    }

    pub fn get(&self, id: &str) -> Option<&Projectile> {
        self.projectiles.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.projectiles.len();
        self.projectiles.clear();
        count
    }

    fn generate_id() -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect();
        format!("proj_{}_{}", millis, suffix.to_lowercase())
    }
}
