//! Simulation clock constants.

/// Fixed simulation rate (ticks/second)
pub const TICK_RATE: f32 = 60.0;
/// Duration of one tick (seconds)
pub const TICK_DT: f32 = 1.0 / TICK_RATE;
