//! Help-calls: waking drones in rooms around a disturbance.
//!
//! The call floods the room graph outward from the disturbance, keeping
//! rooms whose center lies within the call radius. Among the drones in
//! those rooms the best idle responder is chosen by response policy, then
//! by distance.

use std::collections::{BTreeSet, VecDeque};

use glam::Vec2;

use crate::config::HelpResponse;
use crate::level::{LevelMap, RoomId};
use crate::physics::EntityId;

/// Rooms reached by a call from `origin`.
pub fn flood_rooms(level: &LevelMap, origin: Vec2, radius: f32) -> BTreeSet<RoomId> {
    let in_range = |id: RoomId| {
        level
            .room(id)
            .map_or(false, |room| room.center.distance(origin) <= radius)
    };

    let mut reached = BTreeSet::new();
    let mut queue = VecDeque::new();
    match level.room_of(origin) {
        Some(start) => {
            reached.insert(start);
            queue.push_back(start);
        }
        // Outside any room (a corridor): seed with every room in range
        None => {
            for room in level.rooms() {
                if in_range(room.id) {
                    reached.insert(room.id);
                    queue.push_back(room.id);
                }
            }
        }
    }

    while let Some(id) = queue.pop_front() {
        let Some(room) = level.room(id) else {
            continue;
        };
        for &next in &room.neighbours {
            if !reached.contains(&next) && in_range(next) {
                reached.insert(next);
                queue.push_back(next);
            }
        }
    }
    reached
}

/// A drone considered for a help-call
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub agent: EntityId,
    pub position: Vec2,
    pub response: HelpResponse,
    pub camper: bool,
    pub mobile: bool,
    /// Only the idle bottom state is active
    pub idle: bool,
}

impl Candidate {
    #[inline]
    pub fn can_respond(&self) -> bool {
        self.idle && self.mobile && !self.camper && self.response != HelpResponse::Ignore
    }
}

/// Whether a drone at `position` hears a call that reached `rooms`.
pub fn hears(level: &LevelMap, rooms: &BTreeSet<RoomId>, origin: Vec2, radius: f32, position: Vec2) -> bool {
    match level.room_of(position) {
        Some(room) => rooms.contains(&room),
        None => position.distance(origin) <= radius,
    }
}

/// Best responder: eager before normal, then nearest, then lowest id.
pub fn best_responder(candidates: &[Candidate], origin: Vec2) -> Option<EntityId> {
    candidates
        .iter()
        .filter(|c| c.can_respond())
        .min_by(|a, b| {
            b.response
                .cmp(&a.response)
                .then(a.position.distance(origin).total_cmp(&b.position.distance(origin)))
                .then(a.agent.cmp(&b.agent))
        })
        .map(|c| c.agent)
}
