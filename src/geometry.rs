//! Small 2D helpers shared by perception, steering and squad placement.

use std::f32::consts::{PI, TAU};

use glam::Vec2;

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Signed shortest rotation from `from` to `to`.
#[inline]
pub fn angle_delta(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Heading of a vector in radians (0 = +x).
#[inline]
pub fn heading(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Unit vector for a heading.
#[inline]
pub fn unit(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Rotate `angle` toward `target` by at most `max_step`.
pub fn approach_angle(angle: f32, target: f32, max_step: f32) -> f32 {
    let delta = angle_delta(angle, target);
    if delta.abs() <= max_step {
        wrap_angle(target)
    } else {
        wrap_angle(angle + max_step.copysign(delta))
    }
}

/// Move `value` toward `target` by at most `step`.
#[inline]
pub fn approach(value: f32, target: f32, step: f32) -> f32 {
    if value < target {
        (value + step).min(target)
    } else {
        (value - step).max(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-PI / 2.0 - TAU) + PI / 2.0).abs() < 1e-5);
        assert_eq!(wrap_angle(0.5), 0.5);
    }

    #[test]
    fn test_approach_angle_takes_short_way() {
        // From just below +PI to just above -PI is a small positive turn
        let a = approach_angle(PI - 0.1, -PI + 0.1, 0.05);
        assert!((a - (PI - 0.05)).abs() < 1e-5);
        let b = approach_angle(0.0, 0.02, 0.05);
        assert!((b - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_approach_clamps() {
        assert_eq!(approach(0.0, 1.0, 0.25), 0.25);
        assert_eq!(approach(1.0, 0.0, 2.0), 0.0);
    }
}
