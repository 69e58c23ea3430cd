//! Local avoidance of other moving bodies.
//!
//! Walls and static bodies are left to the path; only dynamic bodies in the
//! way are probed.

use glam::Vec2;

use crate::constants::{
    AVOID_FORWARD_BIAS, AVOID_MIN_PROBE, AVOID_PROBE_TIME, AVOID_SIDE_ANGLE, AVOID_STEER_STRENGTH,
    AVOID_YIELD_COS, AVOID_YIELD_SPEED_RATIO,
};
use crate::physics::{BodyState, EntityId, Physics, RayFilter};

#[inline]
fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Bodies moving our way at a comparable speed sort themselves out.
fn moving_along(direction: Vec2, speed: f32, other: &BodyState) -> bool {
    let other_speed = other.speed();
    other_speed > 1e-3
        && other_speed >= speed * AVOID_YIELD_SPEED_RATIO
        && other.velocity.dot(direction) / other_speed >= AVOID_YIELD_COS
}

/// Bend `desired` around the nearest dynamic body ahead.
pub fn steer(physics: &dyn Physics, agent: EntityId, body: &BodyState, desired: Vec2) -> Vec2 {
    let speed = desired.length();
    if speed < 1e-4 {
        return desired;
    }
    let direction = desired / speed;
    let origin = body.position;
    let probe = (speed * AVOID_PROBE_TIME).max(AVOID_MIN_PROBE);
    let width = body.radius * 2.0;
    let filter = RayFilter::excluding(agent).dynamic();

    let Some(hit) = physics.raycast_nearest(origin, origin + direction * probe, &filter, width) else {
        return desired;
    };
    let Some(other) = hit.entity.and_then(|e| physics.body(e)) else {
        return desired;
    };
    if moving_along(direction, speed, &other) {
        return desired;
    }

    let clearance = |dir: Vec2| {
        physics
            .raycast_nearest(origin, origin + dir * probe, &filter, width)
            .map_or(probe, |h| h.distance)
    };
    let side = if clearance(rotate(direction, AVOID_SIDE_ANGLE))
        >= clearance(rotate(direction, -AVOID_SIDE_ANGLE))
    {
        1.0
    } else {
        -1.0
    };

    let proximity = 1.0 - (hit.distance / probe).clamp(0.0, 1.0);
    let biased = rotate(direction, side * AVOID_FORWARD_BIAS * proximity);
    let push = direction.perp() * side * AVOID_STEER_STRENGTH * proximity;
    (biased + push).normalize_or_zero() * speed
}
