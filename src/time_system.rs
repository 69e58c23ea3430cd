//! Fixed-step simulation clock.
//!
//! The AI advances in whole ticks. Timers inside states are plain counters
//! fed with `dt`, and absolute timestamps come from `GameClock::time`.

use crate::constants::TICK_DT;

/// Simulation clock (in seconds)
#[derive(Debug, Clone)]
pub struct GameClock {
    /// Ticks elapsed since creation
    pub tick: u64,
    /// Current simulation time in seconds
    pub time: f32,
    /// Duration of one tick
    pub dt: f32,
}

impl GameClock {
    pub fn new() -> Self {
        Self::with_step(TICK_DT)
    }

    pub fn with_step(dt: f32) -> Self {
        debug_assert!(dt > 0.0, "Tick duration must be positive: {}", dt);
        Self {
            tick: 0,
            time: 0.0,
            dt,
        }
    }

    /// Advance by one tick
    pub fn advance(&mut self) {
        self.tick += 1;
        // Recomputed from the tick count so long runs don't accumulate drift
        self.time = self.tick as f32 * self.dt;
    }

    /// Seconds elapsed since `timestamp`
    #[inline]
    pub fn since(&self, timestamp: f32) -> f32 {
        self.time - timestamp
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_in_ticks() {
        let mut clock = GameClock::with_step(0.25);
        for _ in 0..8 {
            clock.advance();
        }
        assert_eq!(clock.tick, 8);
        assert_eq!(clock.time, 2.0);
        assert_eq!(clock.since(0.5), 1.5);
    }
}
