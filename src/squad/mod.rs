//! Squads: drones sharing one hunted target.
//!
//! Squads live in a generational arena. They are created lazily when a drone
//! enters battle and destroyed as soon as their member list empties, so a
//! stale [`SquadId`] simply stops resolving.

pub mod aos;
pub mod help;
pub mod search;

use glam::Vec2;

pub use aos::{AosRequest, AreaOfSight, Placement};

use crate::physics::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SquadId {
    index: u32,
    generation: u32,
}

/// Squad membership of one drone
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SquadLink(pub Option<SquadId>);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sighting {
    pub time: f32,
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug)]
pub struct Squad {
    members: Vec<EntityId>,
    pub target: Option<EntityId>,
    pub last_seen: Option<Sighting>,
    seen_this_tick: bool,
    /// Time since any member last saw the target
    pub unseen_time: f32,
    pub searching: bool,
    pub aos: AreaOfSight,
    placements: Vec<Placement>,
}

impl Squad {
    fn new(target: Option<EntityId>, sectors: usize) -> Self {
        Self {
            members: Vec::new(),
            target,
            last_seen: None,
            seen_this_tick: false,
            unseen_time: 0.0,
            searching: false,
            aos: AreaOfSight::new(sectors),
            placements: Vec::new(),
        }
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn is_member(&self, agent: EntityId) -> bool {
        self.members.contains(&agent)
    }

    #[inline]
    pub fn seen_this_tick(&self) -> bool {
        self.seen_this_tick
    }

    /// The target was seen within `window` seconds of `now`.
    pub fn has_recent_sighting(&self, now: f32, window: f32) -> bool {
        self.last_seen.map_or(false, |s| now - s.time <= window)
    }

    /// Point assigned to `agent` by the last area-of-sight pass
    pub fn placement_for(&self, agent: EntityId) -> Option<Vec2> {
        self.placements
            .iter()
            .find(|p| p.agent == agent)
            .map(|p| p.point)
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn set_placements(&mut self, placements: Vec<Placement>) {
        self.placements = placements;
    }

    /// Start the next tick: fold the seen flag into the unseen timer.
    pub fn end_tick(&mut self, dt: f32) {
        if self.seen_this_tick {
            self.unseen_time = 0.0;
        } else {
            self.unseen_time += dt;
        }
        self.seen_this_tick = false;
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    squad: Option<Squad>,
}

#[derive(Debug)]
pub struct SquadArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    sectors: usize,
}

impl SquadArena {
    /// `sectors` sizes each squad's area-of-sight ring.
    pub fn new(sectors: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            sectors,
        }
    }

    pub fn create(&mut self, target: Option<EntityId>) -> SquadId {
        let squad = Squad::new(target, self.sectors);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.squad = Some(squad);
                SquadId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    squad: Some(squad),
                });
                SquadId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        tracing::debug!("squad {:?} formed, target {:?}", id, target);
        id
    }

    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.squad.as_ref())
    }

    pub fn get_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.squad.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: SquadId) -> bool {
        self.get(id).is_some()
    }

    /// Free the slot. Returns false when the id was already stale.
    pub fn destroy(&mut self, id: SquadId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.squad.is_none() {
            return false;
        }
        slot.squad = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        tracing::debug!("squad {:?} disbanded", id);
        true
    }

    pub fn ids(&self) -> Vec<SquadId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.squad.is_some())
            .map(|(index, slot)| SquadId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.squad.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Squad currently hunting `target`
    pub fn find_by_target(&self, target: EntityId) -> Option<SquadId> {
        self.ids()
            .into_iter()
            .find(|&id| self.get(id).map_or(false, |s| s.target == Some(target)))
    }

    /// Join `id`, leaving any previous squad. Returns a squad destroyed by the move.
    pub fn join(&mut self, id: SquadId, agent: EntityId, link: &mut SquadLink) -> Option<SquadId> {
        if link.0 == Some(id) && self.get(id).map_or(false, |s| s.is_member(agent)) {
            return None;
        }
        let emptied = self.leave(agent, link);
        if let Some(squad) = self.get_mut(id) {
            squad.members.push(agent);
            link.0 = Some(id);
        }
        emptied
    }

    /// Leave the linked squad; an emptied squad is destroyed and returned.
    /// Leaving twice, or without a squad, does nothing.
    pub fn leave(&mut self, agent: EntityId, link: &mut SquadLink) -> Option<SquadId> {
        let id = link.0.take()?;
        let squad = self.get_mut(id)?;
        squad.members.retain(|&m| m != agent);
        squad.placements.retain(|p| p.agent != agent);
        if squad.members.is_empty() {
            self.destroy(id);
            return Some(id);
        }
        None
    }

    /// Put `agent` in the squad hunting `target`, creating one if needed.
    pub fn enlist(&mut self, agent: EntityId, link: &mut SquadLink, target: EntityId) -> Enlisted {
        if let Some(current) = link.0.and_then(|id| self.get(id).map(|s| (id, s.target))) {
            match current {
                (id, Some(t)) if t == target => return Enlisted::stay(id),
                (id, None) => {
                    self.report_target(id, target);
                    return Enlisted::stay(id);
                }
                _ => {}
            }
        }
        let (squad, formed) = match self.find_by_target(target) {
            Some(id) => (id, false),
            None => (self.create(Some(target)), true),
        };
        let disbanded = self.join(squad, agent, link);
        Enlisted {
            squad,
            formed,
            disbanded,
        }
    }

    pub fn report_seen(&mut self, id: SquadId, position: Vec2, velocity: Vec2, time: f32) {
        if let Some(squad) = self.get_mut(id) {
            squad.last_seen = Some(Sighting {
                time,
                position,
                velocity,
            });
            squad.seen_this_tick = true;
            squad.unseen_time = 0.0;
            squad.searching = false;
        }
    }

    /// Retarget the squad. Old sightings belong to the old target.
    pub fn report_target(&mut self, id: SquadId, target: EntityId) {
        if let Some(squad) = self.get_mut(id) {
            if squad.target != Some(target) {
                squad.target = Some(target);
                squad.last_seen = None;
                squad.placements.clear();
            }
        }
    }
}

/// Result of [`SquadArena::enlist`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enlisted {
    pub squad: SquadId,
    /// A new squad was created
    pub formed: bool,
    /// The drone's previous squad emptied and was destroyed
    pub disbanded: Option<SquadId>,
}

impl Enlisted {
    fn stay(squad: SquadId) -> Self {
        Self {
            squad,
            formed: false,
            disbanded: None,
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
    fn test_squad_destroyed_when_empty() {
        let ids = entities(3);
        let (a, b, target) = (ids[0], ids[1], ids[2]);
        let mut arena = SquadArena::new(8);
        let (mut link_a, mut link_b) = (SquadLink::default(), SquadLink::default());

        let first = arena.enlist(a, &mut link_a, target);
        assert!(first.formed);
        let second = arena.enlist(b, &mut link_b, target);
        assert!(!second.formed);
        assert_eq!(first.squad, second.squad);
        assert_eq!(arena.get(first.squad).map(|s| s.members().len()), Some(2));

        assert_eq!(arena.leave(a, &mut link_a), None);
        // Leaving twice is a no-op
        assert_eq!(arena.leave(a, &mut link_a), None);
        assert_eq!(arena.leave(b, &mut link_b), Some(first.squad));
        assert!(arena.is_empty());
        assert!(arena.get(first.squad).is_none());
    }

    #[test]
    fn test_stale_id_after_slot_reuse() {
        let ids = entities(2);
        let mut arena = SquadArena::new(8);
        let old = arena.create(Some(ids[0]));
        assert!(arena.destroy(old));
        assert!(!arena.destroy(old));
        let new = arena.create(Some(ids[1]));
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new).and_then(|s| s.target), Some(ids[1]));
    }

    #[test]
    fn test_enlist_switches_squads() {
        let ids = entities(3);
        let (a, t1, t2) = (ids[0], ids[1], ids[2]);
        let mut arena = SquadArena::new(8);
        let mut link = SquadLink::default();
        let first = arena.enlist(a, &mut link, t1);
        let second = arena.enlist(a, &mut link, t2);
        assert_ne!(first.squad, second.squad);
        assert_eq!(second.disbanded, Some(first.squad));
        assert_eq!(link.0, Some(second.squad));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_seen_flag_and_unseen_timer() {
        let ids = entities(2);
        let mut arena = SquadArena::new(8);
        let id = arena.create(Some(ids[1]));
        arena.report_seen(id, Vec2::ONE, Vec2::X, 1.0);
        let Some(squad) = arena.get_mut(id) else {
            panic!("squad missing");
        };
        assert!(squad.seen_this_tick());
        assert!(squad.has_recent_sighting(2.0, 2.0));
        squad.end_tick(0.5);
        squad.end_tick(0.5);
        assert_eq!(squad.unseen_time, 0.5);
        assert!(!squad.has_recent_sighting(4.0, 2.0));
    }
}
