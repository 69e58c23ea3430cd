//! Attack patterns.
//!
//! A strategy decides *when* to fire and where to aim; spawning and
//! resolving the shot is the host's job. Output is collected into
//! [`AttackOutput`]s and turned into events by the caller.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BURST_COOLDOWN, BURST_INTERVAL, BURST_SHOTS, DEFAULT_ATTACK_COOLDOWN, LEAD_SMOOTHING,
    PROJECTILE_SPEED, SNIPER_CHARGE_TIME, SNIPER_COOLDOWN,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    #[default]
    Default,
    Burst,
    SniperLaser,
}

/// Continuous visuals an attack can keep running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackEffect {
    /// Sniper aiming laser while charging
    Laser,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttackOutput {
    Fire { aim: Vec2 },
    EffectStarted(AttackEffect),
    EffectStopped(AttackEffect),
}

/// Smoothed target velocity used to lead shots
#[derive(Clone, Copy, Debug, Default)]
pub struct LeadEstimator {
    velocity: Option<Vec2>,
}

impl LeadEstimator {
    pub fn observe(&mut self, velocity: Vec2) {
        self.velocity = Some(match self.velocity {
            Some(previous) => previous.lerp(velocity, LEAD_SMOOTHING),
            None => velocity,
        });
    }

    pub fn clear(&mut self) {
        self.velocity = None;
    }

    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.velocity.is_some()
    }

    /// Where to aim so a projectile fired now meets the target.
    pub fn aim(&self, shooter: Vec2, target: Vec2) -> Vec2 {
        let Some(velocity) = self.velocity else {
            return target;
        };
        let flight = shooter.distance(target) / PROJECTILE_SPEED;
        target + velocity * flight
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Pattern {
    Default { cooldown: f32 },
    Burst { cooldown: f32, shots_left: u32, interval: f32 },
    SniperLaser { cooldown: f32, charge: Option<f32> },
}

#[derive(Clone, Debug)]
pub struct AttackStrategy {
    pattern: Pattern,
    pub lead: LeadEstimator,
}

impl AttackStrategy {
    pub fn new(kind: AttackKind) -> Self {
        let pattern = match kind {
            AttackKind::Default => Pattern::Default { cooldown: 0.0 },
            AttackKind::Burst => Pattern::Burst {
                cooldown: 0.0,
                shots_left: 0,
                interval: 0.0,
            },
            AttackKind::SniperLaser => Pattern::SniperLaser {
                cooldown: 0.0,
                charge: None,
            },
        };
        Self {
            pattern,
            lead: LeadEstimator::default(),
        }
    }

    pub fn kind(&self) -> AttackKind {
        match self.pattern {
            Pattern::Default { .. } => AttackKind::Default,
            Pattern::Burst { .. } => AttackKind::Burst,
            Pattern::SniperLaser { .. } => AttackKind::SniperLaser,
        }
    }

    /// Whether a sniper is currently charging
    pub fn is_charging(&self) -> bool {
        matches!(self.pattern, Pattern::SniperLaser { charge: Some(_), .. })
    }

    /// Attack a visible target this tick.
    pub fn shoot(
        &mut self,
        dt: f32,
        shooter: Vec2,
        target: Vec2,
        target_velocity: Vec2,
        out: &mut Vec<AttackOutput>,
    ) {
        self.lead.observe(target_velocity);
        let aim = self.lead.aim(shooter, target);

        match &mut self.pattern {
            Pattern::Default { cooldown } => {
                *cooldown -= dt;
                if *cooldown <= 0.0 {
                    out.push(AttackOutput::Fire { aim });
                    *cooldown = DEFAULT_ATTACK_COOLDOWN;
                }
            }
            Pattern::Burst {
                cooldown,
                shots_left,
                interval,
            } => {
                *cooldown -= dt;
                *interval -= dt;
                if *shots_left == 0 && *cooldown <= 0.0 {
                    *shots_left = BURST_SHOTS;
                    *interval = 0.0;
                }
                if *shots_left > 0 && *interval <= 0.0 {
                    out.push(AttackOutput::Fire { aim });
                    *shots_left -= 1;
                    *interval = BURST_INTERVAL;
                    if *shots_left == 0 {
                        *cooldown = BURST_COOLDOWN;
                    }
                }
            }
            Pattern::SniperLaser { cooldown, charge } => {
                *cooldown -= dt;
                if *cooldown > 0.0 {
                    return;
                }
                match charge {
                    None => {
                        *charge = Some(0.0);
                        out.push(AttackOutput::EffectStarted(AttackEffect::Laser));
                    }
                    Some(progress) => {
                        *progress += dt;
                        if *progress >= SNIPER_CHARGE_TIME {
                            *charge = None;
                            *cooldown = SNIPER_COOLDOWN;
                            out.push(AttackOutput::EffectStopped(AttackEffect::Laser));
                            out.push(AttackOutput::Fire { aim });
                        }
                    }
                }
            }
        }
    }

    /// No shot this tick: cool down and drop any charge in progress.
    pub fn idle(&mut self, dt: f32, out: &mut Vec<AttackOutput>) {
        match &mut self.pattern {
            Pattern::Default { cooldown } => *cooldown -= dt,
            Pattern::Burst {
                cooldown,
                shots_left,
                interval,
            } => {
                *cooldown -= dt;
                *interval -= dt;
                if *shots_left > 0 {
                    *shots_left = 0;
                    *cooldown = BURST_COOLDOWN;
                }
            }
            Pattern::SniperLaser { cooldown, charge } => {
                *cooldown -= dt;
                if charge.take().is_some() {
                    out.push(AttackOutput::EffectStopped(AttackEffect::Laser));
                }
            }
        }
    }

    /// Stop effects and forget the target's motion.
    pub fn reset(&mut self, out: &mut Vec<AttackOutput>) {
        self.idle(0.0, out);
        self.lead.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(strategy: &mut AttackStrategy, ticks: usize, dt: f32) -> Vec<AttackOutput> {
        let mut out = Vec::new();
        for _ in 0..ticks {
            strategy.shoot(dt, Vec2::ZERO, Vec2::new(5.0, 0.0), Vec2::ZERO, &mut out);
        }
        out
    }

    fn shots(out: &[AttackOutput]) -> usize {
        out.iter()
            .filter(|o| matches!(o, AttackOutput::Fire { .. }))
            .count()
    }

    #[test]
    fn test_default_fires_on_cooldown() {
        let mut strategy = AttackStrategy::new(AttackKind::Default);
        // 2 seconds: t = 0, 0.8, 1.6
        let out = run(&mut strategy, 20, 0.1);
        assert_eq!(shots(&out), 3);
    }

    #[test]
    fn test_burst_fires_three_then_rests() {
        let mut strategy = AttackStrategy::new(AttackKind::Burst);
        let out = run(&mut strategy, 10, 0.05);
        assert_eq!(shots(&out), BURST_SHOTS as usize);
    }

    #[test]
    fn test_sniper_charges_with_laser() {
        let mut strategy = AttackStrategy::new(AttackKind::SniperLaser);
        let out = run(&mut strategy, 1, 0.1);
        assert_eq!(out, vec![AttackOutput::EffectStarted(AttackEffect::Laser)]);
        assert!(strategy.is_charging());
        let out = run(&mut strategy, 13, 0.1);
        assert_eq!(shots(&out), 1);
        assert!(out.contains(&AttackOutput::EffectStopped(AttackEffect::Laser)));
        assert!(!strategy.is_charging());
    }

    #[test]
    fn test_idle_cancels_charge() {
        let mut strategy = AttackStrategy::new(AttackKind::SniperLaser);
        run(&mut strategy, 3, 0.1);
        let mut out = Vec::new();
        strategy.idle(0.1, &mut out);
        assert_eq!(out, vec![AttackOutput::EffectStopped(AttackEffect::Laser)]);
        out.clear();
        strategy.reset(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_lead_aims_ahead() {
        let mut lead = LeadEstimator::default();
        assert_eq!(lead.aim(Vec2::ZERO, Vec2::new(7.0, 0.0)), Vec2::new(7.0, 0.0));
        lead.observe(Vec2::new(0.0, 2.0));
        let aim = lead.aim(Vec2::ZERO, Vec2::new(7.0, 0.0));
        assert!((aim.y - 2.0 * 7.0 / PROJECTILE_SPEED).abs() < 1e-5);
        lead.clear();
        assert!(!lead.is_tracking());
    }
}
