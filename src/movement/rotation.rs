//! Facing control: what to look at and the torque to get there.
//!
//! Sources by priority: a view target, the next waypoint, a slow idle
//! sweep. A higher priority source takes over at once; dropping to a lower
//! one waits until the current source has been absent for the hold time.

use glam::Vec2;
use rand::Rng;

use crate::constants::{FACING_HOLD_TIME, SWEEP_ANGLE, SWEEP_INTERVAL, TORQUE_DAMPING, TORQUE_GAIN};
use crate::geometry::{angle_delta, heading, wrap_angle};
use crate::physics::BodyState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FacingSource {
    Sweep,
    Waypoint,
    View,
}

#[derive(Clone, Debug)]
pub struct RotationControl {
    source: FacingSource,
    target: f32,
    /// Time since the current source was last present
    hold: f32,
    sweep_base: f32,
    sweep_timer: f32,
}

impl RotationControl {
    pub fn new(angle: f32) -> Self {
        Self {
            source: FacingSource::Sweep,
            target: angle,
            hold: 0.0,
            sweep_base: angle,
            sweep_timer: SWEEP_INTERVAL,
        }
    }

    #[inline]
    pub fn source(&self) -> FacingSource {
        self.source
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Pick this tick's facing. `view` and `waypoint` are directions.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        angle: f32,
        view: Option<Vec2>,
        waypoint: Option<Vec2>,
        dt: f32,
        rng: &mut R,
    ) -> f32 {
        let nonzero = |v: &Vec2| v.length_squared() > 1e-8;
        let (candidate, direction) = match (view.filter(nonzero), waypoint.filter(nonzero)) {
            (Some(v), _) => (FacingSource::View, Some(v)),
            (None, Some(w)) => (FacingSource::Waypoint, Some(w)),
            (None, None) => (FacingSource::Sweep, None),
        };

        self.hold += dt;
        if candidate == self.source {
            self.hold = 0.0;
        } else if candidate > self.source || self.hold >= FACING_HOLD_TIME {
            self.source = candidate;
            self.hold = 0.0;
            if candidate == FacingSource::Sweep {
                self.sweep_base = angle;
                self.sweep_timer = SWEEP_INTERVAL;
                self.target = angle;
            }
        }

        if self.source == candidate {
            if let Some(direction) = direction {
                self.target = heading(direction);
            }
        }

        if self.source == FacingSource::Sweep {
            self.sweep_timer -= dt;
            if self.sweep_timer <= 0.0 {
                self.sweep_timer = SWEEP_INTERVAL;
                self.target = wrap_angle(self.sweep_base + rng.gen_range(-SWEEP_ANGLE..=SWEEP_ANGLE));
            }
        }
        self.target
    }
}

/// PD torque toward `target`, scaled by inertia and capped at `max_rate` rad/s.
pub fn facing_torque(body: &BodyState, target: f32, max_rate: f32) -> f32 {
    let error = angle_delta(body.angle, target);
    let rate = (error * TORQUE_GAIN / TORQUE_DAMPING).clamp(-max_rate, max_rate);
    body.inertia * TORQUE_DAMPING * (rate - body.angular_velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BodyKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_view_takes_over_immediately() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut rotation = RotationControl::new(0.0);
        rotation.update(0.0, None, Some(Vec2::X), 0.1, &mut rng);
        assert_eq!(rotation.source(), FacingSource::Waypoint);
        let target = rotation.update(0.0, Some(Vec2::Y), Some(Vec2::X), 0.1, &mut rng);
        assert_eq!(rotation.source(), FacingSource::View);
        assert!((target - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_downgrade_waits_for_hold() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut rotation = RotationControl::new(0.0);
        rotation.update(0.0, Some(Vec2::Y), None, 0.1, &mut rng);
        let held = rotation.update(0.0, None, Some(Vec2::X), 0.1, &mut rng);
        assert_eq!(rotation.source(), FacingSource::View);
        assert!((held - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        for _ in 0..5 {
            rotation.update(0.0, None, Some(Vec2::X), 0.1, &mut rng);
        }
        assert_eq!(rotation.source(), FacingSource::Waypoint);
        assert!(rotation.target().abs() < 1e-5);
    }

    #[test]
    fn test_sweep_stays_near_base() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut rotation = RotationControl::new(1.0);
        for _ in 0..200 {
            let target = rotation.update(1.0, None, None, 0.1, &mut rng);
            assert!(angle_delta(1.0, target).abs() <= SWEEP_ANGLE + 1e-5);
        }
    }

    #[test]
    fn test_torque_turns_toward_target_and_damps() {
        let mut body = BodyState {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            inertia: 0.05,
            radius: 0.3,
            kind: BodyKind::Dynamic,
            is_agent: true,
        };
        assert!(facing_torque(&body, 1.0, 4.0) > 0.0);
        assert!(facing_torque(&body, -1.0, 4.0) < 0.0);
        body.angular_velocity = 4.0;
        // Already turning at full rate: hold, no extra push
        assert!(facing_torque(&body, 1.0, 4.0).abs() < 1e-5);
        assert!(facing_torque(&body, 0.0, 4.0) < 0.0);
    }
}
