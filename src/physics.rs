//! The physics queries the AI consumes.
//!
//! Collision resolution and integration belong to the host. The AI reads
//! body state, casts rays, runs overlap queries, and writes target velocity
//! and torque back. [`crate::sandbox::Sandbox`] is a minimal implementation.

use glam::Vec2;

use crate::geometry::unit;

/// Body handle shared by the physics layer and the AI registry.
pub type EntityId = hecs::Entity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
    Projectile,
}

/// Snapshot of a body for one tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Heading in radians (0 = +x)
    pub angle: f32,
    pub angular_velocity: f32,
    pub inertia: f32,
    pub radius: f32,
    pub kind: BodyKind,
    /// Driven by the AI (drones ignore each other for line of sight)
    pub is_agent: bool,
}

impl BodyState {
    #[inline]
    pub fn facing(&self) -> Vec2 {
        unit(self.angle)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// What a ray may hit
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayFilter {
    /// Body the ray passes through
    pub ignore: Option<EntityId>,
    /// Only level walls stop the ray
    pub walls_only: bool,
    /// Agent bodies are transparent
    pub ignore_agents: bool,
    /// Only dynamic bodies stop the ray (no walls, statics or projectiles)
    pub dynamic_only: bool,
}

impl RayFilter {
    pub fn walls() -> Self {
        Self {
            walls_only: true,
            ..Self::default()
        }
    }

    /// Everything except `entity`
    pub fn excluding(entity: EntityId) -> Self {
        Self {
            ignore: Some(entity),
            ..Self::default()
        }
    }

    pub fn without_agents(mut self) -> Self {
        self.ignore_agents = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic_only = true;
        self
    }

    #[inline]
    pub fn hits_walls(&self) -> bool {
        !self.dynamic_only
    }

    /// Whether a body stops the ray.
    pub fn hits_body(&self, entity: EntityId, body: &BodyState) -> bool {
        if self.walls_only || self.ignore == Some(entity) {
            return false;
        }
        if self.ignore_agents && body.is_agent {
            return false;
        }
        !(self.dynamic_only && body.kind != BodyKind::Dynamic)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// `None` for level walls
    pub entity: Option<EntityId>,
    /// Distance from the ray origin
    pub distance: f32,
    pub point: Vec2,
    pub normal: Vec2,
}

/// Physics queries and outputs used by the AI.
pub trait Physics {
    fn body(&self, id: EntityId) -> Option<BodyState>;

    /// Nearest hit along `from -> to` for a ray of the given width.
    fn raycast_nearest(&self, from: Vec2, to: Vec2, filter: &RayFilter, width: f32)
        -> Option<RayHit>;

    /// Bodies overlapping a circle
    fn query_circle(&self, center: Vec2, radius: f32) -> Vec<EntityId>;

    /// Bodies whose center lies inside a box
    fn query_aabb(&self, min: Vec2, max: Vec2) -> Vec<EntityId>;

    fn set_target_velocity(&mut self, id: EntityId, velocity: Vec2);

    fn set_target_torque(&mut self, id: EntityId, torque: f32);

    /// True when nothing matching `filter` lies between the two points.
    fn line_clear(&self, from: Vec2, to: Vec2, filter: &RayFilter, width: f32) -> bool {
        self.raycast_nearest(from, to, filter, width).is_none()
    }
}
