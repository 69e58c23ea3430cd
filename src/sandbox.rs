//! Minimal physics world: grid walls plus circular bodies.
//!
//! Good enough to drive the AI in tests and the headless demo. Bodies slide
//! along walls axis by axis, accelerate toward their target velocity and
//! turn under torque. Bodies do not collide with each other.

use glam::{IVec2, Vec2};
use hecs::World;

use crate::geometry::wrap_angle;
use crate::level::LevelMap;
use crate::physics::{BodyKind, BodyState, EntityId, Physics, RayFilter, RayHit};

/// Acceleration toward the target velocity (units/second^2)
const MAX_ACCELERATION: f32 = 30.0;

/// Solid cells copied out of a level
#[derive(Clone, Debug)]
pub struct WallGrid {
    walls: Vec<bool>,
    size: IVec2,
    cell_size: f32,
}

impl WallGrid {
    pub fn from_level(level: &LevelMap) -> Self {
        let size = level.size();
        let mut walls = Vec::with_capacity((size.x * size.y) as usize);
        for y in 0..size.y {
            for x in 0..size.x {
                walls.push(level.is_wall(IVec2::new(x, y)));
            }
        }
        Self {
            walls,
            size,
            cell_size: level.cell_size,
        }
    }

    /// Out-of-bounds cells count as walls.
    pub fn is_wall(&self, cell: IVec2) -> bool {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.size.x || cell.y >= self.size.y {
            return true;
        }
        self.walls[(cell.y * self.size.x + cell.x) as usize]
    }

    #[inline]
    fn cell_of(&self, position: Vec2) -> IVec2 {
        (position / self.cell_size).floor().as_ivec2()
    }

    /// Whether a circle overlaps any wall cell.
    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        let min = self.cell_of(center - Vec2::splat(radius));
        let max = self.cell_of(center + Vec2::splat(radius));
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let cell = IVec2::new(x, y);
                if !self.is_wall(cell) {
                    continue;
                }
                let lo = cell.as_vec2() * self.cell_size;
                let closest = center.clamp(lo, lo + Vec2::splat(self.cell_size));
                if closest.distance_squared(center) < radius * radius {
                    return true;
                }
            }
        }
        false
    }

    /// First wall crossed by the segment, as (distance, point, normal).
    pub fn raycast(&self, from: Vec2, to: Vec2) -> Option<(f32, Vec2, Vec2)> {
        let delta = to - from;
        let length = delta.length();
        let mut cell = self.cell_of(from);
        if self.is_wall(cell) {
            return Some((0.0, from, -delta.normalize_or_zero()));
        }
        if length < 1e-6 {
            return None;
        }
        let dir = delta / length;
        let step = IVec2::new(dir.x.signum() as i32, dir.y.signum() as i32);

        let boundary = |c: i32, s: i32, origin: f32, d: f32| -> f32 {
            match s {
                1 => ((c + 1) as f32 * self.cell_size - origin) / d,
                -1 => (c as f32 * self.cell_size - origin) / d,
                _ => f32::INFINITY,
            }
        };
        let mut t_max = Vec2::new(
            if dir.x != 0.0 { boundary(cell.x, step.x, from.x, dir.x) } else { f32::INFINITY },
            if dir.y != 0.0 { boundary(cell.y, step.y, from.y, dir.y) } else { f32::INFINITY },
        );
        let t_delta = Vec2::new(
            if dir.x != 0.0 { self.cell_size / dir.x.abs() } else { f32::INFINITY },
            if dir.y != 0.0 { self.cell_size / dir.y.abs() } else { f32::INFINITY },
        );

        loop {
            let (t, normal) = if t_max.x < t_max.y {
                cell.x += step.x;
                let t = t_max.x;
                t_max.x += t_delta.x;
                (t, Vec2::new(-step.x as f32, 0.0))
            } else {
                cell.y += step.y;
                let t = t_max.y;
                t_max.y += t_delta.y;
                (t, Vec2::new(0.0, -step.y as f32))
            };
            if t > length {
                return None;
            }
            if self.is_wall(cell) {
                return Some((t, from + dir * t, normal));
            }
        }
    }
}

/// Body record stored in the sandbox world
#[derive(Clone, Copy, Debug)]
struct SandboxBody {
    state: BodyState,
    target_velocity: Option<Vec2>,
    torque: f32,
}

pub struct Sandbox {
    bodies: World,
    grid: WallGrid,
}

impl Sandbox {
    pub fn new(level: &LevelMap) -> Self {
        Self {
            bodies: World::new(),
            grid: WallGrid::from_level(level),
        }
    }

    /// Re-read walls after the level changed.
    pub fn sync_walls(&mut self, level: &LevelMap) {
        self.grid = WallGrid::from_level(level);
    }

    pub fn spawn(&mut self, state: BodyState) -> EntityId {
        self.bodies.spawn((SandboxBody {
            state,
            target_velocity: None,
            torque: 0.0,
        },))
    }

    /// A drone body: dynamic, unit mass disc.
    pub fn spawn_agent(&mut self, position: Vec2, radius: f32) -> EntityId {
        self.spawn(BodyState {
            position,
            velocity: Vec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            inertia: 0.5 * radius * radius,
            radius,
            kind: BodyKind::Dynamic,
            is_agent: true,
        })
    }

    /// A dynamic body the host moves itself (players, props).
    pub fn spawn_dynamic(&mut self, position: Vec2, radius: f32) -> EntityId {
        self.spawn(BodyState {
            is_agent: false,
            ..self.agent_template(position, radius)
        })
    }

    pub fn spawn_static(&mut self, position: Vec2, radius: f32) -> EntityId {
        self.spawn(BodyState {
            kind: BodyKind::Static,
            is_agent: false,
            ..self.agent_template(position, radius)
        })
    }

    pub fn spawn_projectile(&mut self, position: Vec2, velocity: Vec2) -> EntityId {
        self.spawn(BodyState {
            velocity,
            kind: BodyKind::Projectile,
            is_agent: false,
            ..self.agent_template(position, 0.05)
        })
    }

    fn agent_template(&self, position: Vec2, radius: f32) -> BodyState {
        BodyState {
            position,
            velocity: Vec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            inertia: 0.5 * radius * radius,
            radius,
            kind: BodyKind::Dynamic,
            is_agent: true,
        }
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.bodies.despawn(id).is_ok()
    }

    /// Set velocity directly, bypassing acceleration.
    pub fn set_velocity(&mut self, id: EntityId, velocity: Vec2) {
        if let Ok(mut body) = self.bodies.get::<&mut SandboxBody>(id) {
            body.state.velocity = velocity;
            body.target_velocity = None;
        }
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) {
        if let Ok(mut body) = self.bodies.get::<&mut SandboxBody>(id) {
            body.state.position = position;
        }
    }

    pub fn set_angle(&mut self, id: EntityId, angle: f32) {
        if let Ok(mut body) = self.bodies.get::<&mut SandboxBody>(id) {
            body.state.angle = wrap_angle(angle);
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len() as usize
    }

    /// Integrate all bodies. Projectiles hitting a wall are removed.
    pub fn step(&mut self, dt: f32) {
        puffin::profile_function!();
        let grid = &self.grid;
        let mut spent = Vec::new();

        for (id, body) in self.bodies.query_mut::<&mut SandboxBody>() {
            let state = &mut body.state;
            if state.kind == BodyKind::Static {
                continue;
            }

            if let Some(target) = body.target_velocity {
                let change = (target - state.velocity).clamp_length_max(MAX_ACCELERATION * dt);
                state.velocity += change;
            }
            state.angular_velocity += body.torque / state.inertia.max(1e-4) * dt;
            body.torque = 0.0;
            state.angle = wrap_angle(state.angle + state.angular_velocity * dt);

            if state.kind == BodyKind::Projectile {
                let next = state.position + state.velocity * dt;
                if grid.raycast(state.position, next).is_some() {
                    spent.push(id);
                } else {
                    state.position = next;
                }
                continue;
            }

            let moved_x = state.position + Vec2::new(state.velocity.x * dt, 0.0);
            if grid.overlaps_circle(moved_x, state.radius) {
                state.velocity.x = 0.0;
            } else {
                state.position = moved_x;
            }
            let moved_y = state.position + Vec2::new(0.0, state.velocity.y * dt);
            if grid.overlaps_circle(moved_y, state.radius) {
                state.velocity.y = 0.0;
            } else {
                state.position = moved_y;
            }
        }

        for id in spent {
            let _ = self.bodies.despawn(id);
        }
    }
}

/// Entry distance of a segment into a circle, if it enters within `length`.
fn ray_circle(from: Vec2, dir: Vec2, length: f32, center: Vec2, radius: f32) -> Option<f32> {
    let m = from - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()).max(0.0);
    (t <= length).then_some(t)
}

impl Physics for Sandbox {
    fn body(&self, id: EntityId) -> Option<BodyState> {
        self.bodies.get::<&SandboxBody>(id).ok().map(|b| b.state)
    }

    fn raycast_nearest(
        &self,
        from: Vec2,
        to: Vec2,
        filter: &RayFilter,
        width: f32,
    ) -> Option<RayHit> {
        let delta = to - from;
        let length = delta.length();
        let dir = delta.normalize_or_zero();
        let mut best: Option<RayHit> = None;

        if filter.hits_walls() {
            let side = dir.perp() * (width * 0.5);
            let offsets = [Vec2::ZERO, side, -side];
            let count = if width > 0.0 { 3 } else { 1 };
            for offset in &offsets[..count] {
                if let Some((distance, point, normal)) = self.grid.raycast(from + *offset, to + *offset) {
                    if best.map_or(true, |b| distance < b.distance) {
                        best = Some(RayHit {
                            entity: None,
                            distance,
                            point: point - *offset,
                            normal,
                        });
                    }
                }
            }
        }

        if filter.walls_only || length < 1e-6 {
            return best;
        }
        for (id, body) in self.bodies.query::<&SandboxBody>().iter() {
            if !filter.hits_body(id, &body.state) {
                continue;
            }
            let radius = body.state.radius + width * 0.5;
            let Some(distance) = ray_circle(from, dir, length, body.state.position, radius) else {
                continue;
            };
            if best.map_or(true, |b| distance < b.distance) {
                let point = from + dir * distance;
                best = Some(RayHit {
                    entity: Some(id),
                    distance,
                    point,
                    normal: (point - body.state.position).normalize_or_zero(),
                });
            }
        }
        best
    }

    fn query_circle(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        self.bodies
            .query::<&SandboxBody>()
            .iter()
            .filter(|(_, b)| b.state.position.distance(center) <= radius + b.state.radius)
            .map(|(id, _)| id)
            .collect()
    }

    fn query_aabb(&self, min: Vec2, max: Vec2) -> Vec<EntityId> {
        self.bodies
            .query::<&SandboxBody>()
            .iter()
            .filter(|(_, b)| {
                let p = b.state.position;
                p.x >= min.x && p.y >= min.y && p.x <= max.x && p.y <= max.y
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn set_target_velocity(&mut self, id: EntityId, velocity: Vec2) {
        if let Ok(mut body) = self.bodies.get::<&mut SandboxBody>(id) {
            body.target_velocity = Some(velocity);
        }
    }

    fn set_target_torque(&mut self, id: EntityId, torque: f32) {
        if let Ok(mut body) = self.bodies.get::<&mut SandboxBody>(id) {
            body.torque = torque;
        }
    }
}
