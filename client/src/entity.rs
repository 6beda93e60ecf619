//! Authoritative entity state with smoothed presentation.
//!
//! One [`EntityReconciler`] exists per entity class. Each entity carries the
//! server's latest target values plus a presentation position that eases
//! toward the target every tick. The entity whose id matches the session
//! identity is the local entity: its position is written only by
//! [`EntityReconciler::predict_local`], never by snapshots or smoothing, while
//! its health and death fields still come from the server.

use crate::config::EntityConfig;
use log::{debug, info, warn};
use shared::protocol::{
    NpcDamaged, NpcSnapshot, NpcSpawned, PlayerDamaged, PlayerHealed, PlayerJoined,
    PlayerSnapshot, PlayerUpdate,
};
use shared::{NpcBehavior, Vec2, MAX_HEALTH};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Instant;

/// Frame rate the smoothing factor is expressed against.
const REFERENCE_RATE: f32 = 60.0;

pub trait EntityKind {
    const LABEL: &'static str;
    const DEFAULT_MAX_HEALTH: i32 = MAX_HEALTH;
}

#[derive(Debug)]
pub struct PlayerKind;

#[derive(Debug)]
pub struct NpcKind;

impl EntityKind for PlayerKind {
    const LABEL: &'static str = "player";
}

impl EntityKind for NpcKind {
    const LABEL: &'static str = "npc";
}

/// Full state used by create and respawn. A missing position marks a
/// placeholder whose presentation snaps to the first real position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub position: Option<Vec2>,
    pub velocity: Vec2,
    pub flip_x: bool,
    pub health: Option<i32>,
    pub max_health: Option<i32>,
    pub is_dead: bool,
    pub skin: Option<String>,
    pub behavior: Option<NpcBehavior>,
}

impl Snapshot {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Some(Vec2::new(x, y)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_health(mut self, health: i32) -> Self {
        self.health = Some(health);
        self
    }

    #[must_use]
    pub fn with_skin(mut self, skin: impl Into<String>) -> Self {
        self.skin = Some(skin.into());
        self
    }

    #[must_use]
    pub fn dead(mut self) -> Self {
        self.is_dead = true;
        self
    }
}

/// Partial update. `None` fields leave the current value untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diff {
    pub position: Option<Vec2>,
    pub velocity: Option<Vec2>,
    pub flip_x: Option<bool>,
    pub health: Option<i32>,
    pub is_dead: Option<bool>,
    pub skin: Option<String>,
    pub behavior: Option<NpcBehavior>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Vec2::new(x, y));
        self
    }

    #[must_use]
    pub fn with_health(mut self, health: i32) -> Self {
        self.health = Some(health);
        self
    }

    #[must_use]
    pub fn with_death(mut self, is_dead: bool) -> Self {
        self.is_dead = Some(is_dead);
        self
    }

    #[must_use]
    pub fn with_skin(mut self, skin: impl Into<String>) -> Self {
        self.skin = Some(skin.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub flip_x: bool,
    pub health: i32,
    pub max_health: i32,
    pub is_dead: bool,
    pub skin: Option<String>,
    pub behavior: Option<NpcBehavior>,
    pub last_update: Instant,
    presentation: Vec2,
    is_local: bool,
    awaiting_position: bool,
}

impl RemoteEntity {
    fn from_snapshot(id: &str, snapshot: Snapshot, default_max: i32, is_local: bool, now: Instant) -> Self {
        let max_health = snapshot.max_health.unwrap_or(default_max).max(1);
        let mut health = snapshot.health.unwrap_or(max_health).clamp(0, max_health);
        let is_dead = snapshot.is_dead || health == 0;
        if is_dead {
            health = 0;
        }
        let position = snapshot.position.unwrap_or(Vec2::ZERO);

        Self {
            id: id.to_string(),
            position,
            velocity: snapshot.velocity,
            flip_x: snapshot.flip_x,
            health,
            max_health,
            is_dead,
            skin: snapshot.skin,
            behavior: snapshot.behavior,
            last_update: now,
            presentation: position,
            is_local,
            awaiting_position: snapshot.position.is_none(),
        }
    }

    /// Smoothed position for rendering. Equal to `position` for the local entity.
    pub fn presentation(&self) -> Vec2 {
        self.presentation
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent {
    Created { id: String },
    Died { id: String },
    HealthChanged { id: String, health: i32 },
    SkinChanged { id: String, skin: String },
    Respawned { id: String },
    /// Presentation resources (health indicator, highlight) belong to the
    /// renderer and should be released on this.
    Removed { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveInput {
    pub direction: Vec2,
    pub facing_left: Option<bool>,
}

/// Result of one local prediction step, ready to be sent as a position intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMotion {
    pub position: Vec2,
    pub velocity: Vec2,
    pub flip_x: bool,
}

pub struct EntityReconciler<K: EntityKind> {
    entities: HashMap<String, RemoteEntity>,
    local_id: Option<String>,
    smoothing_factor: f32,
    speed: f32,
    events: Vec<EntityEvent>,
    _kind: PhantomData<K>,
}

impl<K: EntityKind> EntityReconciler<K> {
    pub fn new(config: &EntityConfig, local_id: Option<String>) -> Self {
        Self {
            entities: HashMap::new(),
            local_id,
            smoothing_factor: config.smoothing_factor,
            speed: config.player_speed,
            events: Vec::new(),
            _kind: PhantomData,
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn set_local_identity(&mut self, local_id: Option<String>) {
        for entity in self.entities.values_mut() {
            entity.is_local = local_id.as_deref() == Some(entity.id.as_str());
            if entity.is_local {
                entity.presentation = entity.position;
            }
        }
        self.local_id = local_id;
    }

    fn is_local_id(&self, id: &str) -> bool {
        self.local_id.as_deref() == Some(id)
    }

    /// Inserts a new entity. Duplicate ids are logged and ignored.
    pub fn create(&mut self, id: &str, snapshot: Snapshot, now: Instant) -> bool {
        if self.entities.contains_key(id) {
            warn!("Ignoring duplicate {} create for {}", K::LABEL, id);
            return false;
        }

        let is_local = self.is_local_id(id);
        let entity = RemoteEntity::from_snapshot(id, snapshot, K::DEFAULT_MAX_HEALTH, is_local, now);
        debug!("Created {} {} (local: {})", K::LABEL, id, is_local);
        self.entities.insert(id.to_string(), entity);
        self.events.push(EntityEvent::Created { id: id.to_string() });
        true
    }

    /// Merges a partial update into an existing entity.
    ///
    /// Unknown ids are logged and ignored. Motion fields are dropped for the
    /// local entity. A dead entity stays dead: only [`respawn`](Self::respawn)
    /// brings it back.
    pub fn apply_update(&mut self, id: &str, diff: Diff, now: Instant) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            warn!("Ignoring {} update for unknown id {}", K::LABEL, id);
            return false;
        };

        if entity.is_local {
            if diff.position.is_some() {
                debug!("Local {} {} owns its position; snapshot position dropped", K::LABEL, id);
            }
        } else {
            if let Some(position) = diff.position {
                entity.position = position;
                if entity.awaiting_position {
                    entity.presentation = position;
                    entity.awaiting_position = false;
                }
            }
            if let Some(velocity) = diff.velocity {
                entity.velocity = velocity;
            }
            if let Some(flip_x) = diff.flip_x {
                entity.flip_x = flip_x;
            }
        }

        if let Some(skin) = diff.skin {
            if entity.skin.as_deref() != Some(skin.as_str()) {
                entity.skin = Some(skin.clone());
                self.events.push(EntityEvent::SkinChanged {
                    id: id.to_string(),
                    skin,
                });
            }
        }

        if let Some(behavior) = diff.behavior {
            entity.behavior = Some(behavior);
        }

        if entity.is_dead {
            let revives = diff.is_dead == Some(false) || diff.health.is_some_and(|health| health > 0);
            if revives {
                debug!("{} {} is dead; ignoring implicit resurrection", K::LABEL, id);
            }
        } else {
            if let Some(health) = diff.health {
                let health = health.clamp(0, entity.max_health);
                if health != entity.health {
                    entity.health = health;
                    self.events.push(EntityEvent::HealthChanged {
                        id: id.to_string(),
                        health,
                    });
                }
            }

            if diff.is_dead == Some(true) || entity.health == 0 {
                entity.is_dead = true;
                entity.health = 0;
                entity.velocity = Vec2::ZERO;
                info!("{} {} died", K::LABEL, id);
                self.events.push(EntityEvent::Died { id: id.to_string() });
            }
        }

        entity.last_update = now;
        true
    }

    /// Explicitly brings an entity back (or creates it) from a full snapshot.
    pub fn respawn(&mut self, id: &str, snapshot: Snapshot, now: Instant) -> bool {
        let Some(existing) = self.entities.get(id) else {
            return self.create(id, snapshot, now);
        };

        let mut snapshot = snapshot;
        if snapshot.skin.is_none() {
            snapshot.skin = existing.skin.clone();
        }
        if snapshot.position.is_none() {
            snapshot.position = Some(existing.position);
        }

        let entity = RemoteEntity::from_snapshot(id, snapshot, K::DEFAULT_MAX_HEALTH, existing.is_local, now);
        info!("Respawned {} {}", K::LABEL, id);
        self.entities.insert(id.to_string(), entity);
        self.events.push(EntityEvent::Respawned { id: id.to_string() });
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<RemoteEntity> {
        let removed = self.entities.remove(id)?;
        debug!("Removed {} {}", K::LABEL, id);
        self.events.push(EntityEvent::Removed { id: id.to_string() });
        Some(removed)
    }

    /// Eases every remote presentation toward its target. The local entity is
    /// skipped.
    pub fn tick(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let alpha = 1.0 - (1.0 - self.smoothing_factor).powf(dt * REFERENCE_RATE);

        for entity in self.entities.values_mut() {
            if entity.is_local {
                continue;
            }
            entity.presentation = entity.presentation.lerp(entity.position, alpha);
        }
    }

    /// Advances the local entity from raw input. The only writer of its position.
    pub fn predict_local(&mut self, input: MoveInput, dt: f32) -> Option<LocalMotion> {
        let id = self.local_id.as_ref()?;
        let entity = self.entities.get_mut(id)?;

        if entity.is_dead {
            entity.velocity = Vec2::ZERO;
            return Some(LocalMotion {
                position: entity.position,
                velocity: Vec2::ZERO,
                flip_x: entity.flip_x,
            });
        }

        let direction = input.direction.normalized();
        entity.velocity = direction;
        entity.position = entity.position.offset(direction.scaled(self.speed * dt.max(0.0)));
        entity.presentation = entity.position;

        match input.facing_left {
            Some(facing_left) => entity.flip_x = facing_left,
            None if direction.x != 0.0 => entity.flip_x = direction.x < 0.0,
            None => {}
        }

        Some(LocalMotion {
            position: entity.position,
            velocity: direction,
            flip_x: entity.flip_x,
        })
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn local(&self) -> Option<&RemoteEntity> {
        self.local_id.as_deref().and_then(|id| self.entities.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<EntityEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drops every entity, emitting a removal event for each.
    pub fn clear(&mut self) -> usize {
        let count = self.entities.len();
        for id in self.entities.keys() {
            self.events.push(EntityEvent::Removed { id: id.clone() });
        }
        self.entities.clear();
        count
    }
}

impl From<&PlayerJoined> for Snapshot {
    fn from(joined: &PlayerJoined) -> Self {
        Self {
            position: Some(Vec2::new(joined.x, joined.y)),
            flip_x: joined.flip_x,
            skin: joined.skin.clone(),
            ..Self::default()
        }
    }
}

impl From<&PlayerSnapshot> for Snapshot {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            position: Some(Vec2::new(player.x, player.y)),
            velocity: Vec2::new(player.vx, player.vy),
            flip_x: player.flip_x,
            health: player.health,
            max_health: None,
            is_dead: player.is_dead,
            skin: player.skin.clone(),
            behavior: None,
        }
    }
}

impl From<&NpcSpawned> for Snapshot {
    fn from(npc: &NpcSpawned) -> Self {
        Self {
            position: Some(Vec2::new(npc.x, npc.y)),
            health: npc.health,
            max_health: npc.max_health,
            ..Self::default()
        }
    }
}

impl From<&PlayerUpdate> for Diff {
    fn from(update: &PlayerUpdate) -> Self {
        Self {
            position: Some(Vec2::new(update.x, update.y)),
            velocity: Some(Vec2::new(update.vx, update.vy)),
            flip_x: Some(update.flip_x),
            skin: update.skin.clone(),
            ..Self::default()
        }
    }
}

impl From<&PlayerSnapshot> for Diff {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            position: Some(Vec2::new(player.x, player.y)),
            velocity: Some(Vec2::new(player.vx, player.vy)),
            flip_x: Some(player.flip_x),
            health: player.health,
            is_dead: Some(player.is_dead),
            skin: player.skin.clone(),
            behavior: None,
        }
    }
}

impl From<&NpcSnapshot> for Diff {
    fn from(npc: &NpcSnapshot) -> Self {
        Self {
            position: Some(Vec2::new(npc.x, npc.y)),
            velocity: None,
            flip_x: Some(npc.flip_x),
            health: npc.health,
            is_dead: Some(npc.is_dead),
            skin: None,
            behavior: npc.behavior,
        }
    }
}

impl From<&PlayerDamaged> for Diff {
    fn from(damaged: &PlayerDamaged) -> Self {
        Self {
            health: Some(damaged.current_health),
            is_dead: damaged.died.then_some(true),
            ..Self::default()
        }
    }
}

impl From<&PlayerHealed> for Diff {
    fn from(healed: &PlayerHealed) -> Self {
        Self {
            health: Some(healed.current_health),
            ..Self::default()
        }
    }
}

impl From<&NpcDamaged> for Diff {
    fn from(damaged: &NpcDamaged) -> Self {
        Self {
            health: Some(damaged.health),
            is_dead: damaged.died.then_some(true),
            ..Self::default()
        }
    }
}
