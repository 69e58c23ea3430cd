//! Locomotion, steering and facing constants.

/// Default walking speed (units/second)
pub const WALK_SPEED: f32 = 2.0;
/// Default running speed (units/second)
pub const RUN_SPEED: f32 = 4.0;
/// Default speed for precise positioning (units/second)
pub const PRECISE_SPEED: f32 = 1.5;
/// Distance at which a precise goal counts as reached
pub const PRECISE_TOLERANCE: f32 = 0.1;
/// Goals closer than this to the current one are treated as the same goal
pub const GOAL_EPSILON: f32 = 0.05;
/// Distance at which an intermediate waypoint counts as reached
pub const WAYPOINT_ARRIVE_RADIUS: f32 = 0.3;
/// Distance to the final point at which the drone starts slowing down
pub const ARRIVE_SLOWDOWN_RADIUS: f32 = 1.0;
/// Forward probe length expressed as seconds of travel
pub const AVOID_PROBE_TIME: f32 = 0.6;
/// Shortest forward probe
pub const AVOID_MIN_PROBE: f32 = 1.0;
/// Angle of the side probes relative to the travel direction (radians)
pub const AVOID_SIDE_ANGLE: f32 = 0.7;
/// Strength of the perpendicular steering component
pub const AVOID_STEER_STRENGTH: f32 = 1.2;
/// Extra rotation of the travel direction toward the clear side (radians)
pub const AVOID_FORWARD_BIAS: f32 = 0.25;
/// Another agent heading within this cosine of our heading is not avoided
pub const AVOID_YIELD_COS: f32 = 0.5;
/// ...provided it moves at least this fraction of our speed
pub const AVOID_YIELD_SPEED_RATIO: f32 = 0.8;
/// Time without progress after which the path is requested again (seconds)
pub const STUCK_TIME: f32 = 1.5;
/// Progress needed within STUCK_TIME to count as moving
pub const STUCK_MIN_PROGRESS: f32 = 0.2;
/// Wait before a goal whose path failed is requested again (seconds)
pub const PATH_RETRY_DELAY: f32 = 1.0;

/// Default rotation speed (radians/second)
pub const ROTATION_SPEED: f32 = 4.0;
/// Minimum time a facing source is held before a switch
pub const FACING_HOLD_TIME: f32 = 0.4;
/// Interval between idle sweep retargets (seconds)
pub const SWEEP_INTERVAL: f32 = 2.5;
/// Maximum idle sweep offset from the current heading (radians)
pub const SWEEP_ANGLE: f32 = 1.2;
/// Proportional gain of the facing torque controller (per inertia)
pub const TORQUE_GAIN: f32 = 40.0;
/// Damping gain of the facing torque controller (per inertia)
pub const TORQUE_DAMPING: f32 = 10.0;
