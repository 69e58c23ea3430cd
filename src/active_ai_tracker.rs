//! Active AI tracking for performance.
//!
//! Online drones are either "active" (think every tick) or "dormant" (too
//! far from the focus point, skipped entirely). Offline drones are not
//! tracked at all until the host brings them back online.

use std::collections::HashSet;

use glam::Vec2;

use crate::physics::EntityId;

/// Tracks which drones are active (ticked) vs dormant (not ticked).
#[derive(Debug, Clone, Default)]
pub struct ActiveAiTracker {
    /// Drones currently within the active radius
    active: HashSet<EntityId>,

    /// Online drones outside the active radius
    dormant: HashSet<EntityId>,
}

impl ActiveAiTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a drone. It starts active and is culled on the next activation pass.
    pub fn register(&mut self, entity: EntityId) {
        self.dormant.remove(&entity);
        self.active.insert(entity);
    }

    /// Stop tracking a drone (offline or despawned).
    pub fn remove(&mut self, entity: EntityId) {
        self.active.remove(&entity);
        self.dormant.remove(&entity);
    }

    pub fn set_online(&mut self, entity: EntityId, online: bool) {
        if online {
            if !self.is_online(entity) {
                self.register(entity);
            }
        } else {
            self.remove(entity);
        }
    }

    #[inline]
    pub fn is_active(&self, entity: EntityId) -> bool {
        self.active.contains(&entity)
    }

    #[inline]
    pub fn is_dormant(&self, entity: EntityId) -> bool {
        self.dormant.contains(&entity)
    }

    #[inline]
    pub fn is_online(&self, entity: EntityId) -> bool {
        self.is_active(entity) || self.is_dormant(entity)
    }

    /// Active drones in id order.
    pub fn active_sorted(&self) -> Vec<EntityId> {
        let mut active: Vec<EntityId> = self.active.iter().copied().collect();
        active.sort();
        active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.dormant.clear();
    }

    /// Re-sort online drones around `focus`.
    /// Returns the drones that just woke up.
    pub fn update_activation(
        &mut self,
        focus: Vec2,
        radius: f32,
        positions: impl IntoIterator<Item = (EntityId, Vec2)>,
    ) -> Vec<EntityId> {
        let mut newly_active = Vec::new();
        for (entity, position) in positions {
            if !self.is_online(entity) {
                continue;
            }
            if position.distance(focus) <= radius {
                if self.dormant.remove(&entity) {
                    newly_active.push(entity);
                }
                self.active.insert(entity);
            } else {
                self.active.remove(&entity);
                self.dormant.insert(entity);
            }
        }
        newly_active.sort();
        newly_active
    }
}
