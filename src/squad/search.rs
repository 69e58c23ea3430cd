//! Search planning around a lost target's last known position.
//!
//! Concentric rings of walkable points are laid around the center. Each
//! searching member claims an angular slot, spiralling to a neighbour slot
//! when its preferred one is taken, and walks the ring points nearest to
//! its slot from the inside out.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::config::SquadConfig;
use crate::constants::SEARCH_SLOTS;
use crate::geometry::{angle_delta, heading};
use crate::level::LevelMap;
use crate::physics::EntityId;

/// Used-slot bitmap
#[derive(Clone, Copy, Debug, Default)]
pub struct SlotMap {
    used: u32,
}

impl SlotMap {
    /// Claim `preferred` or the nearest free slot, alternating sides.
    /// When every slot is used the preferred one is shared.
    pub fn claim(&mut self, preferred: u32) -> u32 {
        let preferred = preferred % SEARCH_SLOTS;
        for step in 0..SEARCH_SLOTS {
            let offset = (step + 1) / 2;
            let slot = if step % 2 == 1 {
                (preferred + offset) % SEARCH_SLOTS
            } else {
                (preferred + SEARCH_SLOTS - offset) % SEARCH_SLOTS
            };
            if !self.is_used(slot) {
                self.used |= 1 << slot;
                return slot;
            }
        }
        preferred
    }

    pub fn is_used(&self, slot: u32) -> bool {
        self.used & (1 << (slot % SEARCH_SLOTS)) != 0
    }
}

#[inline]
fn slot_angle(slot: u32) -> f32 {
    slot as f32 * TAU / SEARCH_SLOTS as f32
}

fn slot_of(direction: Vec2) -> u32 {
    let angle = heading(direction).rem_euclid(TAU);
    ((angle / TAU * SEARCH_SLOTS as f32).round() as u32) % SEARCH_SLOTS
}

/// Walkable points on each ring, innermost ring first.
pub fn ring_points(level: &LevelMap, center: Vec2, config: &SquadConfig) -> Vec<Vec<Vec2>> {
    (1..=config.search_rings)
        .map(|ring| {
            let radius = ring as f32 * config.search_ring_step;
            let count = ((TAU * radius / config.search_point_spacing).ceil() as usize).max(4);
            (0..count)
                .map(|i| center + Vec2::from_angle(i as f32 * TAU / count as f32) * radius)
                .filter(|&p| level.is_walkable(level.cell_coord(p)))
                .collect()
        })
        .collect()
}

/// A member's share of a search
#[derive(Clone, Debug, PartialEq)]
pub struct SearchAssignment {
    pub agent: EntityId,
    pub slot: u32,
    pub waypoints: Vec<Vec2>,
}

/// Someone taking part in a search
#[derive(Clone, Copy, Debug)]
pub struct Searcher {
    pub agent: EntityId,
    pub position: Vec2,
    pub camper: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPlan {
    pub assignments: Vec<SearchAssignment>,
    /// Members that hold position instead of searching
    pub campers: Vec<EntityId>,
}

/// Split the search around `center` between `members`.
pub fn plan_search(
    level: &LevelMap,
    config: &SquadConfig,
    center: Vec2,
    members: &[Searcher],
) -> SearchPlan {
    let rings = ring_points(level, center, config);
    let mut sorted = members.to_vec();
    sorted.sort_by_key(|m| m.agent);

    let mut slots = SlotMap::default();
    let mut plan = SearchPlan::default();
    for member in sorted {
        if member.camper {
            plan.campers.push(member.agent);
            continue;
        }
        let slot = slots.claim(slot_of(member.position - center));
        let angle = slot_angle(slot);

        let mut waypoints = Vec::with_capacity(rings.len() + 1);
        if level.is_walkable(level.cell_coord(center)) {
            waypoints.push(center);
        }
        for ring in &rings {
            let nearest = ring.iter().copied().min_by(|a, b| {
                let da = angle_delta(angle, heading(*a - center)).abs();
                let db = angle_delta(angle, heading(*b - center)).abs();
                da.total_cmp(&db)
            });
            waypoints.extend(nearest);
        }
        plan.assignments.push(SearchAssignment {
            agent: member.agent,
            slot,
            waypoints,
        });
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_spiral() {
        let mut slots = SlotMap::default();
        assert_eq!(slots.claim(3), 3);
        assert_eq!(slots.claim(3), 4);
        assert_eq!(slots.claim(3), 2);
        assert_eq!(slots.claim(3), 5);
        assert_eq!(slots.claim(0), 0);
        assert_eq!(slots.claim(0), 1);
        assert_eq!(slots.claim(0), SEARCH_SLOTS - 1);
    }

    #[test]
    fn test_full_map_shares_preferred() {
        let mut slots = SlotMap::default();
        for i in 0..SEARCH_SLOTS {
            slots.claim(i);
        }
        assert_eq!(slots.claim(5), 5);
    }

    #[test]
    fn test_rings_skip_walls() {
        let mut level = LevelMap::new(30, 30, 1.0);
        let center = Vec2::new(15.5, 15.5);
        let config = SquadConfig::default();
        let open = ring_points(&level, center, &config);
        assert_eq!(open.len(), config.search_rings);
        for y in 0..30 {
            level.set_wall(glam::IVec2::new(18, y), true);
        }
        let walled = ring_points(&level, center, &config);
        assert!(walled[0].len() < open[0].len());
        assert!(walled
            .iter()
            .flatten()
            .all(|&p| level.is_walkable(level.cell_coord(p))));
    }

    #[test]
    fn test_members_get_distinct_slots_and_campers_excluded() {
        let level = LevelMap::new(30, 30, 1.0);
        let mut world = hecs::World::new();
        let ids: Vec<EntityId> = (0..3).map(|_| world.spawn(())).collect();
        let center = Vec2::new(15.5, 15.5);
        let members = [
            Searcher { agent: ids[0], position: Vec2::new(20.0, 15.5), camper: false },
            Searcher { agent: ids[1], position: Vec2::new(20.0, 15.5), camper: false },
            Searcher { agent: ids[2], position: Vec2::new(10.0, 15.5), camper: true },
        ];
        let plan = plan_search(&level, &SquadConfig::default(), center, &members);
        assert_eq!(plan.campers, vec![ids[2]]);
        assert_eq!(plan.assignments.len(), 2);
        assert_ne!(plan.assignments[0].slot, plan.assignments[1].slot);
        for assignment in &plan.assignments {
            assert_eq!(assignment.waypoints.first(), Some(&center));
            assert_eq!(assignment.waypoints.len(), 1 + SquadConfig::default().search_rings);
        }
    }
}
