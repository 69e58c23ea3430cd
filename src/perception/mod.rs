//! Per-drone target sensing.
//!
//! Each tick a drone's [`Perception`] produces a [`TargetReading`]: the
//! target is visible, remembered at a last known position, or unknown.
//! It also latches damage notifications for exactly one tick and spots
//! incoming projectiles.

pub mod sensor;

use glam::Vec2;

pub use sensor::{Probe, SensorTracker};

use crate::config::{DroneParams, PerceptionConfig};
use crate::constants::{THREAT_APPROACH_COS, THREAT_ORIGIN_DISTANCE};
use crate::geometry::{angle_delta, heading};
use crate::physics::{BodyKind, BodyState, EntityId, Physics, RayFilter};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TargetReading {
    #[default]
    None,
    LastKnown {
        position: Vec2,
    },
    Visible {
        entity: EntityId,
        position: Vec2,
        distance: f32,
        /// The target hurt this drone recently
        damaging: bool,
    },
}

impl TargetReading {
    #[inline]
    pub fn is_visible(&self) -> bool {
        matches!(self, TargetReading::Visible { .. })
    }

    pub fn position(&self) -> Option<Vec2> {
        match *self {
            TargetReading::None => None,
            TargetReading::LastKnown { position } | TargetReading::Visible { position, .. } => {
                Some(position)
            }
        }
    }

    pub fn entity(&self) -> Option<EntityId> {
        match *self {
            TargetReading::Visible { entity, .. } => Some(entity),
            _ => None,
        }
    }
}

/// Damage taken during the previous tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageEvent {
    pub source: Option<EntityId>,
    pub source_position: Option<Vec2>,
    pub time: f32,
}

/// A projectile heading for the drone
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threat {
    pub projectile: EntityId,
    /// Guessed shooter position, back along the trajectory
    pub origin: Vec2,
}

#[derive(Clone, Copy, Debug)]
struct Sighting {
    entity: EntityId,
    position: Vec2,
    velocity: Vec2,
    time: f32,
}

#[derive(Clone, Debug)]
pub enum SightMode {
    /// Watch one entity: the override if set, else the world's hunted entity
    Direct { target: Option<EntityId> },
    Sensor(SensorTracker),
}

/// Everything `Perception::update` reads
pub struct SenseInput<'a> {
    pub physics: &'a dyn Physics,
    pub agent: EntityId,
    pub body: &'a BodyState,
    pub hunted: Option<EntityId>,
    pub params: &'a DroneParams,
    pub config: &'a PerceptionConfig,
    pub time: f32,
}

#[derive(Clone, Debug)]
pub struct Perception {
    mode: SightMode,
    /// Widening of the view cone from `fov_min` (0) to `fov_max` (1), owned by the state machine
    pub fov_ramp: f32,
    reading: TargetReading,
    last_seen: Option<Sighting>,
    pending_damage: Option<DamageEvent>,
    damage: Option<DamageEvent>,
    damaging: Option<(EntityId, f32)>,
    threat: Option<Threat>,
}

impl Perception {
    pub fn new(mode: SightMode) -> Self {
        Self {
            mode,
            fov_ramp: 0.0,
            reading: TargetReading::None,
            last_seen: None,
            pending_damage: None,
            damage: None,
            damaging: None,
            threat: None,
        }
    }

    pub fn for_params(params: &DroneParams) -> Self {
        if params.sensor {
            Self::new(SightMode::Sensor(SensorTracker::new()))
        } else {
            Self::new(SightMode::Direct { target: None })
        }
    }

    /// Watch `target` instead of the world's hunted entity (direct mode only).
    pub fn set_target_override(&mut self, target: Option<EntityId>) {
        if let SightMode::Direct { target: current } = &mut self.mode {
            *current = target;
        }
    }

    pub fn mode(&self) -> &SightMode {
        &self.mode
    }

    pub fn on_sensor_enter(&mut self, entity: EntityId) {
        if let SightMode::Sensor(tracker) = &mut self.mode {
            tracker.on_enter(entity);
        }
    }

    pub fn on_sensor_exit(&mut self, entity: EntityId) {
        if let SightMode::Sensor(tracker) = &mut self.mode {
            tracker.on_exit(entity);
        }
    }

    /// Latch damage; it shows up as [`Perception::damage`] on the next update only.
    pub fn notify_damage(&mut self, source: Option<EntityId>, source_position: Option<Vec2>, time: f32) {
        self.pending_damage = Some(DamageEvent {
            source,
            source_position,
            time,
        });
    }

    #[inline]
    pub fn reading(&self) -> TargetReading {
        self.reading
    }

    #[inline]
    pub fn damage(&self) -> Option<DamageEvent> {
        self.damage
    }

    #[inline]
    pub fn threat(&self) -> Option<Threat> {
        self.threat
    }

    /// Velocity of the target at the last sighting.
    pub fn last_seen_velocity(&self) -> Option<Vec2> {
        self.last_seen.map(|s| s.velocity)
    }

    pub fn last_seen_time(&self) -> Option<f32> {
        self.last_seen.map(|s| s.time)
    }

    /// Drop remembered sightings and damage.
    pub fn forget(&mut self) {
        self.last_seen = None;
        self.damaging = None;
        self.threat = None;
        self.reading = TargetReading::None;
    }

    pub fn update(&mut self, input: &SenseInput) {
        puffin::profile_function!();
        let time = input.time;
        let config = input.config;

        self.damage = self.pending_damage.take();
        if let Some(DamageEvent {
            source: Some(source),
            ..
        }) = self.damage
        {
            self.damaging = Some((source, time + config.damage_memory_time));
        }
        if self.damaging.map_or(false, |(_, until)| time > until) {
            self.damaging = None;
        }

        let ramp = self.fov_ramp;
        let seen = match &mut self.mode {
            SightMode::Direct { target } => {
                if target.map_or(false, |t| input.physics.body(t).is_none()) {
                    *target = None;
                }
                target.or(input.hunted).and_then(|entity| {
                    let body = input.physics.body(entity)?;
                    can_see(input, entity, &body, ramp)
                        .then(|| (entity, body, body.position.distance(input.body.position)))
                })
            }
            SightMode::Sensor(tracker) => tracker
                .select(time, config.relock_distance, config.lock_timeout, |entity| {
                    match input.physics.body(entity) {
                        None => Probe::Gone,
                        Some(body) if can_see(input, entity, &body, ramp) => Probe::Visible {
                            distance: body.position.distance(input.body.position),
                        },
                        Some(_) => Probe::Hidden,
                    }
                })
                .and_then(|(entity, distance)| {
                    input.physics.body(entity).map(|body| (entity, body, distance))
                }),
        };

        if let Some(sighting) = self.last_seen {
            if input.physics.body(sighting.entity).is_none() {
                self.last_seen = None;
            }
        }

        self.reading = match seen {
            Some((entity, body, distance)) => {
                self.last_seen = Some(Sighting {
                    entity,
                    position: body.position,
                    velocity: body.velocity,
                    time,
                });
                TargetReading::Visible {
                    entity,
                    position: body.position,
                    distance,
                    damaging: self.damaging.map_or(false, |(source, _)| source == entity),
                }
            }
            None => match self.last_seen {
                Some(s) if time - s.time <= config.memory_time => {
                    TargetReading::LastKnown { position: s.position }
                }
                _ => TargetReading::None,
            },
        };

        self.threat = scan_threats(input);
    }
}

/// Whether `target` is visible from the drone this tick.
pub fn can_see(input: &SenseInput, target: EntityId, target_body: &BodyState, fov_ramp: f32) -> bool {
    let params = input.params;
    let offset = target_body.position - input.body.position;
    let distance = offset.length();
    if distance > params.detect_radius {
        return false;
    }

    let heard = distance <= params.hearing_radius
        || (target_body.speed() >= input.config.hearing_fast_speed
            && distance <= params.hearing_fast_radius);
    if !heard {
        let ramp = fov_ramp.clamp(0.0, 1.0);
        let half_angle = params.fov_min + (params.fov_max - params.fov_min) * ramp;
        if angle_delta(input.body.angle, heading(offset)).abs() > half_angle {
            return false;
        }
    }

    let filter = RayFilter::excluding(input.agent).without_agents();
    match input
        .physics
        .raycast_nearest(input.body.position, target_body.position, &filter, 0.0)
    {
        None => true,
        Some(hit) => hit.entity == Some(target),
    }
}

/// Nearest projectile inside the threat radius moving toward the drone.
fn scan_threats(input: &SenseInput) -> Option<Threat> {
    let position = input.body.position;
    input
        .physics
        .query_circle(position, input.config.threat_radius)
        .into_iter()
        .filter_map(|id| {
            let body = input.physics.body(id)?;
            if body.kind != BodyKind::Projectile {
                return None;
            }
            let speed = body.speed();
            let to_agent = (position - body.position).normalize_or_zero();
            if speed < 1e-3 || body.velocity.dot(to_agent) / speed < THREAT_APPROACH_COS {
                return None;
            }
            let origin = body.position - body.velocity / speed * THREAT_ORIGIN_DISTANCE;
            Some((body.position.distance(position), Threat { projectile: id, origin }))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, threat)| threat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelMap;
    use crate::sandbox::Sandbox;

    fn arena() -> LevelMap {
        LevelMap::from_ascii(&[
            "################",
            "#..............#",
            "#..............#",
            "#......#.......#",
            "#..............#",
            "################",
        ])
    }

    struct Rig {
        sandbox: Sandbox,
        drone: EntityId,
        target: EntityId,
        params: DroneParams,
        config: PerceptionConfig,
    }

    impl Rig {
        fn new(drone_at: Vec2, target_at: Vec2) -> Self {
            let mut sandbox = Sandbox::new(&arena());
            let drone = sandbox.spawn_agent(drone_at, 0.3);
            let target = sandbox.spawn_dynamic(target_at, 0.3);
            Self {
                sandbox,
                drone,
                target,
                params: DroneParams::default(),
                config: PerceptionConfig::default(),
            }
        }

        fn sense(&self, perception: &mut Perception, time: f32) {
            let Some(body) = self.sandbox.body(self.drone) else {
                panic!("drone body missing");
            };
            perception.update(&SenseInput {
                physics: &self.sandbox,
                agent: self.drone,
                body: &body,
                hunted: Some(self.target),
                params: &self.params,
                config: &self.config,
                time,
            });
        }
    }

    #[test]
    fn test_visible_in_front() {
        let rig = Rig::new(Vec2::new(2.5, 1.5), Vec2::new(8.5, 1.5));
        let mut perception = Perception::for_params(&rig.params);
        rig.sense(&mut perception, 0.0);
        let reading = perception.reading();
        assert_eq!(reading.entity(), Some(rig.target));
        assert!(matches!(reading, TargetReading::Visible { distance, .. } if (distance - 6.0).abs() < 1e-4));
    }

    #[test]
    fn test_behind_needs_fov_ramp() {
        let mut rig = Rig::new(Vec2::new(8.5, 1.5), Vec2::new(2.5, 1.5));
        rig.sandbox.set_angle(rig.drone, 0.0);
        let mut perception = Perception::for_params(&rig.params);
        rig.sense(&mut perception, 0.0);
        assert!(!perception.reading().is_visible());

        perception.fov_ramp = 1.0;
        rig.sense(&mut perception, 0.1);
        assert!(perception.reading().is_visible());
    }

    #[test]
    fn test_hearing_ignores_facing() {
        let rig = Rig::new(Vec2::new(6.5, 1.5), Vec2::new(5.0, 1.5));
        let mut perception = Perception::for_params(&rig.params);
        rig.sense(&mut perception, 0.0);
        assert!(perception.reading().is_visible());
    }

    #[test]
    fn test_wall_blocks_then_memory_expires() {
        let mut rig = Rig::new(Vec2::new(2.5, 3.5), Vec2::new(10.5, 3.5));
        let mut perception = Perception::for_params(&rig.params);
        // Pillar at x = 7 blocks the view
        rig.sense(&mut perception, 0.0);
        assert_eq!(perception.reading(), TargetReading::None);

        rig.sandbox.set_position(rig.target, Vec2::new(10.5, 2.5));
        rig.sense(&mut perception, 0.1);
        assert!(perception.reading().is_visible());

        rig.sandbox.set_position(rig.target, Vec2::new(10.5, 3.5));
        rig.sense(&mut perception, 1.0);
        assert_eq!(
            perception.reading(),
            TargetReading::LastKnown {
                position: Vec2::new(10.5, 2.5)
            }
        );
        rig.sense(&mut perception, 0.1 + rig.config.memory_time + 0.5);
        assert_eq!(perception.reading(), TargetReading::None);
    }

    #[test]
    fn test_damage_is_edge_triggered() {
        let rig = Rig::new(Vec2::new(2.5, 1.5), Vec2::new(8.5, 1.5));
        let mut perception = Perception::for_params(&rig.params);
        perception.notify_damage(Some(rig.target), None, 0.0);
        rig.sense(&mut perception, 0.0);
        assert!(perception.damage().is_some());
        assert!(matches!(perception.reading(), TargetReading::Visible { damaging: true, .. }));
        rig.sense(&mut perception, 0.1);
        assert!(perception.damage().is_none());
        assert!(matches!(perception.reading(), TargetReading::Visible { damaging: true, .. }));
        rig.sense(&mut perception, 0.2 + rig.config.damage_memory_time);
        assert!(matches!(perception.reading(), TargetReading::Visible { damaging: false, .. }));
    }

    #[test]
    fn test_stale_target_reads_none() {
        let mut rig = Rig::new(Vec2::new(2.5, 1.5), Vec2::new(8.5, 1.5));
        let mut perception = Perception::for_params(&rig.params);
        rig.sense(&mut perception, 0.0);
        assert!(perception.reading().is_visible());
        rig.sandbox.despawn(rig.target);
        rig.sense(&mut perception, 0.1);
        assert_eq!(perception.reading(), TargetReading::None);
    }

    #[test]
    fn test_sensor_mode_uses_candidates() {
        let mut rig = Rig::new(Vec2::new(2.5, 1.5), Vec2::new(8.5, 1.5));
        rig.params.sensor = true;
        let mut perception = Perception::for_params(&rig.params);
        rig.sense(&mut perception, 0.0);
        assert_eq!(perception.reading(), TargetReading::None);
        perception.on_sensor_enter(rig.target);
        rig.sense(&mut perception, 0.1);
        assert_eq!(perception.reading().entity(), Some(rig.target));
        perception.on_sensor_exit(rig.target);
        rig.sense(&mut perception, 0.2);
        assert!(matches!(perception.reading(), TargetReading::LastKnown { .. }));
    }

    #[test]
    fn test_incoming_projectile_is_a_threat() {
        let mut rig = Rig::new(Vec2::new(8.5, 1.5), Vec2::new(14.5, 4.5));
        let shot = rig.sandbox.spawn_projectile(Vec2::new(5.5, 1.5), Vec2::new(10.0, 0.0));
        let _receding = rig.sandbox.spawn_projectile(Vec2::new(10.5, 1.5), Vec2::new(10.0, 0.0));
        let mut perception = Perception::for_params(&rig.params);
        rig.sense(&mut perception, 0.0);
        let threat = perception.threat();
        assert_eq!(threat.map(|t| t.projectile), Some(shot));
        let origin = threat.map(|t| t.origin).unwrap_or_default();
        assert!((origin.x - (5.5 - THREAT_ORIGIN_DISTANCE)).abs() < 1e-4);
    }
}
