//! Sensor-based target selection with lock hysteresis.

use crate::physics::EntityId;

/// What the caller learned about a candidate this tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Probe {
    /// The entity no longer exists
    Gone,
    Hidden,
    Visible { distance: f32 },
}

/// Candidate set fed by sensor enter/exit events.
///
/// A lock is kept until another visible candidate is closer by more than the
/// relock distance *and* the lock timeout has passed. A lock on a candidate
/// that stopped being visible is replaced at once.
#[derive(Clone, Debug, Default)]
pub struct SensorTracker {
    candidates: Vec<EntityId>,
    locked: Option<EntityId>,
    locked_at: f32,
}

impl SensorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter(&mut self, entity: EntityId) {
        if !self.candidates.contains(&entity) {
            self.candidates.push(entity);
        }
    }

    pub fn on_exit(&mut self, entity: EntityId) {
        self.candidates.retain(|&c| c != entity);
        if self.locked == Some(entity) {
            self.locked = None;
        }
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.candidates.contains(&entity)
    }

    pub fn candidates(&self) -> &[EntityId] {
        &self.candidates
    }

    #[inline]
    pub fn locked(&self) -> Option<EntityId> {
        self.locked
    }

    /// Pick this tick's target. Gone candidates are dropped.
    pub fn select<F>(
        &mut self,
        now: f32,
        relock_distance: f32,
        lock_timeout: f32,
        mut probe: F,
    ) -> Option<(EntityId, f32)>
    where
        F: FnMut(EntityId) -> Probe,
    {
        let mut visible = Vec::with_capacity(self.candidates.len());
        self.candidates.retain(|&entity| match probe(entity) {
            Probe::Gone => false,
            Probe::Hidden => true,
            Probe::Visible { distance } => {
                visible.push((entity, distance));
                true
            }
        });

        let nearest = visible
            .iter()
            .copied()
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let current = self
            .locked
            .and_then(|locked| visible.iter().copied().find(|(e, _)| *e == locked));

        match (current, nearest) {
            (Some((locked, locked_distance)), Some((closer, distance))) => {
                let steal = closer != locked
                    && distance + relock_distance < locked_distance
                    && now - self.locked_at >= lock_timeout;
                if steal {
                    self.lock(closer, now);
                    Some((closer, distance))
                } else {
                    Some((locked, locked_distance))
                }
            }
            (None, Some((entity, distance))) => {
                self.lock(entity, now);
                Some((entity, distance))
            }
            (_, None) => {
                self.locked = None;
                None
            }
        }
    }

    fn lock(&mut self, entity: EntityId, now: f32) {
        if self.locked != Some(entity) {
            tracing::trace!("sensor lock -> {:?}", entity);
            self.locked = Some(entity);
            self.locked_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    fn entities(n: usize) -> Vec<EntityId> {
        let mut world = World::new();
        (0..n).map(|_| world.spawn(())).collect()
    }

    #[test]
    fn test_locks_nearest_visible() {
        let ids = entities(2);
        let mut sensor = SensorTracker::new();
        sensor.on_enter(ids[0]);
        sensor.on_enter(ids[1]);
        let picked = sensor.select(0.0, 1.5, 1.0, |e| {
            if e == ids[0] {
                Probe::Visible { distance: 6.0 }
            } else {
                Probe::Visible { distance: 3.0 }
            }
        });
        assert_eq!(picked.map(|p| p.0), Some(ids[1]));
    }

    #[test]
    fn test_hysteresis_needs_distance_and_timeout() {
        let ids = entities(2);
        let (a, b) = (ids[0], ids[1]);
        let mut sensor = SensorTracker::new();
        sensor.on_enter(a);
        sensor.select(0.0, 1.5, 1.0, |_| Probe::Visible { distance: 5.0 });
        assert_eq!(sensor.locked(), Some(a));
        sensor.on_enter(b);

        let probe = |far: f32, near: f32| {
            move |e: EntityId| {
                if e == a {
                    Probe::Visible { distance: far }
                } else {
                    Probe::Visible { distance: near }
                }
            }
        };

        // Closer by 2 but the lock is too fresh
        sensor.select(0.5, 1.5, 1.0, probe(5.0, 3.0));
        assert_eq!(sensor.locked(), Some(a));
        // Old enough but only closer by 1
        sensor.select(2.0, 1.5, 1.0, probe(5.0, 4.0));
        assert_eq!(sensor.locked(), Some(a));
        // Both conditions hold
        sensor.select(2.5, 1.5, 1.0, probe(5.0, 3.0));
        assert_eq!(sensor.locked(), Some(b));
    }

    #[test]
    fn test_hidden_lock_replaced_immediately() {
        let ids = entities(2);
        let (a, b) = (ids[0], ids[1]);
        let mut sensor = SensorTracker::new();
        sensor.on_enter(a);
        sensor.on_enter(b);
        sensor.select(0.0, 1.5, 1.0, |e| {
            if e == a {
                Probe::Visible { distance: 2.0 }
            } else {
                Probe::Visible { distance: 2.5 }
            }
        });
        assert_eq!(sensor.locked(), Some(a));
        let picked = sensor.select(0.1, 1.5, 1.0, |e| {
            if e == a {
                Probe::Hidden
            } else {
                Probe::Visible { distance: 2.5 }
            }
        });
        assert_eq!(picked.map(|p| p.0), Some(b));
    }

    #[test]
    fn test_gone_candidates_dropped() {
        let ids = entities(1);
        let mut sensor = SensorTracker::new();
        sensor.on_enter(ids[0]);
        assert!(sensor.select(0.0, 1.5, 1.0, |_| Probe::Gone).is_none());
        assert!(sensor.candidates().is_empty());
        assert!(sensor.locked().is_none());
    }
}
