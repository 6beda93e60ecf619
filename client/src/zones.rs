//! Hazard zones and their local tick effects.
//!
//! The server decides when zones exist. The client owns the per-zone interval
//! that turns standing in a zone into heal or damage intents, plus a periodic
//! exit check. Both timers are keyed by zone id so a zone can never own more
//! than one of each.

use crate::config::ZoneConfig;
use crate::timers::TimerRegistry;
use log::{debug, info};
use shared::Vec2;
use std::collections::HashMap;
use std::time::Instant;

pub const SHRINKING_ZONE_ID: &str = "growing_damage_zone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    Healing,
    Damage,
    Shrinking,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneGeometry {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Circle {
        center: Vec2,
        radius: f32,
    },
}

impl ZoneGeometry {
    pub fn contains(&self, point: Vec2) -> bool {
        match *self {
            ZoneGeometry::Rect {
                x,
                y,
                width,
                height,
            } => point.x >= x && point.x <= x + width && point.y >= y && point.y <= y + height,
            ZoneGeometry::Circle { center, radius } => center.distance(point) <= radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardZone {
    pub id: String,
    pub kind: ZoneKind,
    pub geometry: ZoneGeometry,
    pub active: bool,
}

/// Zone id for a trigger area, derived from its kind and anchor.
pub fn zone_id(kind: ZoneKind, anchor: Vec2) -> String {
    let label = match kind {
        ZoneKind::Healing => "heal",
        ZoneKind::Damage => "damage",
        ZoneKind::Shrinking => "shrinking",
    };
    format!("{}_{}_{}", label, anchor.x, anchor.y)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ZoneTimer {
    Effect(String),
    ExitCheck(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneEffect {
    Heal { zone_id: String, amount: i32 },
    Damage { zone_id: String, amount: i32 },
    Exited { zone_id: String },
}

/// What the zone checks need to know about the local player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalStatus {
    pub position: Vec2,
    pub is_dead: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkingZone {
    pub center: Vec2,
    pub radius: f32,
    pub target_radius: Option<f32>,
    applied_at: Instant,
}

pub struct ZoneSynchronizer {
    config: ZoneConfig,
    zones: HashMap<String, HazardZone>,
    timers: TimerRegistry<ZoneTimer>,
    shrinking: Option<ShrinkingZone>,
}

impl ZoneSynchronizer {
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            zones: HashMap::new(),
            timers: TimerRegistry::new(),
            shrinking: None,
        }
    }

    /// Activates a zone. Starting an id that is already active does nothing.
    pub fn start(&mut self, id: &str, kind: ZoneKind, geometry: ZoneGeometry, now: Instant) -> bool {
        if self.zones.get(id).is_some_and(|zone| zone.active) {
            debug!("Zone {} already active", id);
            return false;
        }

        self.zones.insert(
            id.to_string(),
            HazardZone {
                id: id.to_string(),
                kind,
                geometry,
                active: true,
            },
        );

        let effect = ZoneTimer::Effect(id.to_string());
        let exit_check = ZoneTimer::ExitCheck(id.to_string());
        match kind {
            ZoneKind::Healing => {
                self.timers.arm_interval(effect, now, self.config.heal_interval);
                self.timers.arm_interval(exit_check, now, self.config.exit_check_interval);
            }
            ZoneKind::Damage => {
                self.timers.arm_interval(effect, now, self.config.damage_interval);
                self.timers.arm_interval(exit_check, now, self.config.exit_check_interval);
            }
            ZoneKind::Shrinking => {
                self.timers.cancel(&effect);
                self.timers.cancel(&exit_check);
            }
        }

        info!("Zone {} started ({:?})", id, kind);
        true
    }

    /// Removes a zone and cancels its timers. Unknown ids are ignored.
    pub fn stop(&mut self, id: &str) -> bool {
        self.timers.cancel(&ZoneTimer::Effect(id.to_string()));
        self.timers.cancel(&ZoneTimer::ExitCheck(id.to_string()));

        match self.zones.remove(id) {
            Some(_) => {
                info!("Zone {} stopped", id);
                true
            }
            None => false,
        }
    }

    /// Fires due zone timers against the local player's status.
    ///
    /// Effects are withheld while the local player is dead or absent. An exit
    /// check that finds the player outside its zone stops that zone.
    pub fn poll(&mut self, now: Instant, local: Option<LocalStatus>) -> Vec<ZoneEffect> {
        let mut effects = Vec::new();

        for timer in self.timers.poll(now) {
            match timer {
                ZoneTimer::Effect(id) => {
                    let Some(zone) = self.zones.get(&id) else {
                        continue;
                    };
                    let alive = local.is_some_and(|status| !status.is_dead);
                    if !alive {
                        debug!("Skipping zone {} tick, no living local player", id);
                        continue;
                    }
                    match zone.kind {
                        ZoneKind::Healing => effects.push(ZoneEffect::Heal {
                            zone_id: id,
                            amount: self.config.heal_amount,
                        }),
                        ZoneKind::Damage => effects.push(ZoneEffect::Damage {
                            zone_id: id,
                            amount: self.config.damage_amount,
                        }),
                        ZoneKind::Shrinking => {}
                    }
                }
                ZoneTimer::ExitCheck(id) => {
                    let (Some(zone), Some(status)) = (self.zones.get(&id), local) else {
                        continue;
                    };
                    if !zone.geometry.contains(status.position) {
                        self.stop(&id);
                        effects.push(ZoneEffect::Exited { zone_id: id });
                    }
                }
            }
        }

        effects
    }

    pub fn begin_shrinking(&mut self, center: Vec2, radius: f32, now: Instant) {
        self.stop(SHRINKING_ZONE_ID);
        self.start(
            SHRINKING_ZONE_ID,
            ZoneKind::Shrinking,
            ZoneGeometry::Circle { center, radius },
            now,
        );
        self.shrinking = Some(ShrinkingZone {
            center,
            radius,
            target_radius: None,
            applied_at: now,
        });
    }

    /// Applies a shrinking-zone update if it clears the rate limit.
    ///
    /// A first update always applies. After that, a shrink must exceed the
    /// minimum shrink delta and interval, or any change must exceed the larger
    /// change delta and interval.
    pub fn update_shrinking(&mut self, center: Vec2, radius: f32, target_radius: Option<f32>, now: Instant) -> bool {
        let apply = match &self.shrinking {
            None => true,
            Some(zone) => {
                let elapsed = now.saturating_duration_since(zone.applied_at);
                let delta = (radius - zone.radius).abs();
                let shrink = radius < zone.radius
                    && delta > self.config.min_shrink_delta
                    && elapsed > self.config.min_shrink_interval;
                let large_change =
                    delta > self.config.min_change_delta && elapsed > self.config.min_change_interval;
                shrink || large_change
            }
        };

        if !apply {
            if let Some(zone) = self.shrinking.as_mut() {
                zone.target_radius = target_radius.or(zone.target_radius);
            }
            return false;
        }

        self.shrinking = Some(ShrinkingZone {
            center,
            radius,
            target_radius,
            applied_at: now,
        });
        self.zones.insert(
            SHRINKING_ZONE_ID.to_string(),
            HazardZone {
                id: SHRINKING_ZONE_ID.to_string(),
                kind: ZoneKind::Shrinking,
                geometry: ZoneGeometry::Circle { center, radius },
                active: true,
            },
        );
        true
    }

    pub fn end_shrinking(&mut self) -> bool {
        let had_zone = self.shrinking.take().is_some();
        self.stop(SHRINKING_ZONE_ID) || had_zone
    }

    pub fn shrinking(&self) -> Option<&ShrinkingZone> {
        self.shrinking.as_ref()
    }

    pub fn get(&self, id: &str) -> Option<&HazardZone> {
        self.zones.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.zones.get(id).is_some_and(|zone| zone.active)
    }

    pub fn zones(&self) -> impl Iterator<Item = &HazardZone> {
        self.zones.values()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Tears down every zone and timer. Returns the number of zones dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.zones.len();
        self.timers.clear();
        self.zones.clear();
        self.shrinking = None;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn square() -> ZoneGeometry {
        ZoneGeometry::Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }

    fn inside() -> Option<LocalStatus> {
        Some(LocalStatus {
            position: Vec2::new(50.0, 50.0),
            is_dead: false,
        })
    }

    fn damage_count(effects: &[ZoneEffect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, ZoneEffect::Damage { .. }))
            .count()
    }

    #[test]
    fn test_double_start_keeps_one_timer() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());

        assert!(zones.start("z1", ZoneKind::Damage, square(), start));
        assert!(!zones.start("z1", ZoneKind::Damage, square(), start));

        let effects = zones.poll(start + ms(600), inside());
        assert_eq!(damage_count(&effects), 1);

        let effects = zones.poll(start + ms(1200), inside());
        assert_eq!(damage_count(&effects), 1);
    }

    #[test]
    fn test_restart_after_stop_replaces() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        zones.start("z1", ZoneKind::Damage, square(), start);
        assert!(zones.stop("z1"));
        assert_eq!(zones.timer_count(), 0);

        zones.start("z1", ZoneKind::Damage, square(), start + ms(300));
        assert_eq!(zones.timer_count(), 2);
        assert_eq!(damage_count(&zones.poll(start + ms(600), inside())), 0);
        assert_eq!(damage_count(&zones.poll(start + ms(900), inside())), 1);
    }

    #[test]
    fn test_stop_unknown_is_noop() {
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        assert!(!zones.stop("missing"));
    }

    #[test]
    fn test_heal_ticks_every_interval() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        zones.start("heal_1", ZoneKind::Healing, square(), start);

        assert!(zones
            .poll(start + ms(2999), inside())
            .iter()
            .all(|effect| !matches!(effect, ZoneEffect::Heal { .. })));
        assert_eq!(
            zones.poll(start + ms(3000), inside()),
            vec![ZoneEffect::Heal {
                zone_id: "heal_1".into(),
                amount: 1
            }]
        );
    }

    #[test]
    fn test_no_effects_while_dead() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        zones.start("z1", ZoneKind::Damage, square(), start);

        let dead = Some(LocalStatus {
            position: Vec2::new(50.0, 50.0),
            is_dead: true,
        });
        assert_eq!(damage_count(&zones.poll(start + ms(600), dead)), 0);
        assert!(zones.is_active("z1"));
    }

    #[test]
    fn test_exit_check_stops_zone() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        zones.start("z1", ZoneKind::Damage, square(), start);

        let outside = Some(LocalStatus {
            position: Vec2::new(500.0, 50.0),
            is_dead: false,
        });
        let effects = zones.poll(start + ms(100), outside);
        assert_eq!(effects, vec![ZoneEffect::Exited { zone_id: "z1".into() }]);
        assert!(!zones.is_active("z1"));
        assert_eq!(zones.timer_count(), 0);
        assert!(zones.poll(start + ms(5000), inside()).is_empty());
    }

    #[test]
    fn test_shrinking_rate_limit() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        let center = Vec2::new(400.0, 300.0);

        assert!(zones.update_shrinking(center, 500.0, Some(100.0), start));
        assert!(!zones.update_shrinking(center, 480.0, None, start + ms(1000)));
        assert!(!zones.update_shrinking(center, 490.0, None, start + ms(3001)));
        assert!(zones.update_shrinking(center, 480.0, None, start + ms(3001)));
        assert_eq!(zones.shrinking().map(|zone| zone.radius), Some(480.0));

        assert!(!zones.update_shrinking(center, 520.0, None, start + ms(8000)));
        assert!(zones.update_shrinking(center, 520.0, None, start + ms(8002)));
    }

    #[test]
    fn test_shrinking_lifecycle() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        zones.begin_shrinking(Vec2::new(0.0, 0.0), 600.0, start);
        assert!(zones.is_active(SHRINKING_ZONE_ID));
        assert_eq!(zones.timer_count(), 0);

        assert!(zones.end_shrinking());
        assert!(zones.shrinking().is_none());
        assert!(!zones.end_shrinking());
    }

    #[test]
    fn test_clear_cancels_everything() {
        let start = Instant::now();
        let mut zones = ZoneSynchronizer::new(ZoneConfig::default());
        zones.start("a", ZoneKind::Damage, square(), start);
        zones.start("b", ZoneKind::Healing, square(), start);
        zones.begin_shrinking(Vec2::ZERO, 100.0, start);

        assert_eq!(zones.clear(), 3);
        assert_eq!(zones.timer_count(), 0);
        assert!(zones.poll(start + ms(10_000), inside()).is_empty());
    }

    #[test]
    fn test_geometry_contains() {
        let circle = ZoneGeometry::Circle {
            center: Vec2::new(0.0, 0.0),
            radius: 10.0,
        };
        assert!(circle.contains(Vec2::new(6.0, 8.0)));
        assert!(!circle.contains(Vec2::new(8.0, 8.0)));
        assert!(square().contains(Vec2::new(100.0, 0.0)));
    }

    #[test]
    fn test_zone_id_from_anchor() {
        assert_eq!(zone_id(ZoneKind::Damage, Vec2::new(32.0, 64.0)), "damage_32_64");
    }
}
