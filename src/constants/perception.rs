//! Sensing constants.

use std::f32::consts::PI;

/// Maximum distance a drone can see its target
pub const DETECT_RADIUS: f32 = 12.0;
/// Distance inside which suspicion grows at the fast rate
pub const OPTIMAL_DETECT_RADIUS: f32 = 6.0;
/// Half angle of the view cone when the suspicion ramp is zero
pub const FOV_MIN_HALF_ANGLE: f32 = 0.6;
/// Half angle of the view cone when the suspicion ramp is full (all around)
pub const FOV_MAX_HALF_ANGLE: f32 = PI;
/// Targets closer than this are heard regardless of facing
pub const HEARING_RADIUS: f32 = 2.0;
/// Fast targets closer than this are heard regardless of facing
pub const HEARING_FAST_RADIUS: f32 = 5.0;
/// Speed above which a target counts as fast for hearing
pub const HEARING_FAST_SPEED: f32 = 4.5;
/// How long a lost target is remembered as a last known position (seconds)
pub const MEMORY_TIME: f32 = 3.0;
/// How long a damage source keeps counting as "damaging" (seconds)
pub const DAMAGE_MEMORY_TIME: f32 = 2.0;
/// A sensor candidate must be this much closer to steal the lock
pub const SENSOR_RELOCK_DISTANCE: f32 = 1.5;
/// Minimum time a sensor lock is held before switching (seconds)
pub const SENSOR_LOCK_TIMEOUT: f32 = 1.0;
/// Radius within which projectiles are tracked as threats
pub const THREAT_RADIUS: f32 = 4.0;
/// Cosine between projectile velocity and the direction to the drone for it to count as incoming
pub const THREAT_APPROACH_COS: f32 = 0.7;
/// How far back along a projectile's trajectory its origin is guessed
pub const THREAT_ORIGIN_DISTANCE: f32 = 6.0;
