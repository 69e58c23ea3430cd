//! Area of sight: spreading squad members around a visible target.
//!
//! Rays are cast from the target outward, one per angular sector, to learn
//! how far each sector reaches before a wall. Members are then fed in and
//! each gets the sector that best trades off congestion, how far it would
//! have to swing around, crowding next to already placed members and how
//! well the sector's reach fits its preferred distance.
//!
//! Usage per tick: `begin`, `feed` every member, `place_end`.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::constants::{
    AOS_MIN_BAND_FRACTION, AOS_MIN_SECTORS, AOS_WEIGHT_BAND, AOS_WEIGHT_BEARING,
    AOS_WEIGHT_CONGESTION, AOS_WEIGHT_CROWDING,
};
use crate::debug::{DebugColor, DebugSink};
use crate::geometry::{heading, unit};
use crate::physics::{EntityId, Physics, RayFilter};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AosRequest {
    pub agent: EntityId,
    pub position: Vec2,
    /// Higher priorities choose first and weigh more in the occupancy map
    pub priority: f32,
    /// Preferred distance from the target
    pub optimal: f32,
    /// Acceptable distance band
    pub band: (f32, f32),
    /// Sectors reserved on each side of the chosen one
    pub free_radius: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub agent: EntityId,
    pub sector: usize,
    pub point: Vec2,
}

#[derive(Clone, Debug)]
pub struct AreaOfSight {
    sectors: usize,
    origin: Vec2,
    reach: Vec<f32>,
    occupancy: Vec<f32>,
    requests: Vec<AosRequest>,
    last: Vec<Placement>,
}

impl AreaOfSight {
    pub fn new(sectors: usize) -> Self {
        assert!(
            sectors >= AOS_MIN_SECTORS,
            "area of sight needs at least {} sectors",
            AOS_MIN_SECTORS
        );
        Self {
            sectors,
            origin: Vec2::ZERO,
            reach: vec![0.0; sectors],
            occupancy: vec![0.0; sectors],
            requests: Vec::new(),
            last: Vec::new(),
        }
    }

    #[inline]
    pub fn sectors(&self) -> usize {
        self.sectors
    }

    #[inline]
    pub fn sector_angle(&self, sector: usize) -> f32 {
        sector as f32 * TAU / self.sectors as f32
    }

    /// Sector containing a direction from the origin
    pub fn sector_of(&self, direction: Vec2) -> usize {
        let angle = heading(direction).rem_euclid(TAU);
        let width = TAU / self.sectors as f32;
        ((angle / width).round() as usize) % self.sectors
    }

    fn sector_distance(&self, a: usize, b: usize) -> usize {
        let d = a.abs_diff(b);
        d.min(self.sectors - d)
    }

    /// Cast the sector rays around `origin`.
    pub fn begin(&mut self, origin: Vec2, physics: &dyn Physics, max_range: f32, wall_margin: f32) {
        puffin::profile_function!();
        self.origin = origin;
        self.requests.clear();
        self.occupancy.iter_mut().for_each(|o| *o = 0.0);
        let filter = RayFilter::walls();
        for sector in 0..self.sectors {
            let end = origin + unit(self.sector_angle(sector)) * max_range;
            self.reach[sector] = match physics.raycast_nearest(origin, end, &filter, 0.0) {
                Some(hit) => (hit.distance - wall_margin).max(0.0),
                None => max_range,
            };
        }
    }

    pub fn feed(&mut self, request: AosRequest) {
        let sector = self.sector_of(request.position - self.origin);
        self.occupancy[sector] += request.priority;
        self.requests.push(request);
    }

    /// Assign sectors to every fed member.
    pub fn place_end(&mut self) -> Vec<Placement> {
        assert!(!self.requests.is_empty(), "area of sight placed without members");
        let mut order = std::mem::take(&mut self.requests);
        order.sort_by(|a, b| b.priority.total_cmp(&a.priority).then(a.agent.cmp(&b.agent)));

        let mut taken = vec![false; self.sectors];
        let mut placements: Vec<Placement> = Vec::with_capacity(order.len());

        for request in &order {
            let own = self.sector_of(request.position - self.origin);
            let any_free = taken.iter().any(|t| !t);
            let min_reach = request.optimal * AOS_MIN_BAND_FRACTION;
            let any_usable = (0..self.sectors)
                .any(|s| (!any_free || !taken[s]) && self.reach[s] >= min_reach);

            let mut best: Option<(f32, usize)> = None;
            for sector in 0..self.sectors {
                if any_free && taken[sector] {
                    continue;
                }
                if any_usable && self.reach[sector] < min_reach {
                    continue;
                }
                let score = self.score(request, own, sector, &placements);
                if best.map_or(true, |(s, _)| score < s) {
                    best = Some((score, sector));
                }
            }
            let Some((_, sector)) = best else {
                continue;
            };

            for offset in 0..=request.free_radius {
                taken[(sector + offset) % self.sectors] = true;
                taken[(sector + self.sectors - offset % self.sectors) % self.sectors] = true;
            }
            let distance = self.reach[sector].min(request.optimal);
            placements.push(Placement {
                agent: request.agent,
                sector,
                point: self.origin + unit(self.sector_angle(sector)) * distance,
            });
        }

        self.last = placements.clone();
        placements
    }

    fn score(&self, request: &AosRequest, own: usize, sector: usize, placed: &[Placement]) -> f32 {
        let mut congestion = self.occupancy[sector];
        if sector == own {
            congestion -= request.priority;
        }
        let bearing = self.sector_distance(sector, own) as f32 / (self.sectors as f32 / 2.0);
        let crowding: f32 = placed
            .iter()
            .map(|p| 1.0 / (1.0 + self.sector_distance(sector, p.sector) as f32))
            .sum();

        let distance = self.reach[sector].min(request.optimal);
        let (low, high) = request.band;
        let band = if distance < low {
            (low - distance) / low.max(1e-3)
        } else if distance > high {
            (distance - high) / high.max(1e-3)
        } else {
            0.0
        } + (request.optimal - distance).max(0.0) / request.optimal.max(1e-3);

        AOS_WEIGHT_CONGESTION * congestion.max(0.0)
            + AOS_WEIGHT_BEARING * bearing
            + AOS_WEIGHT_CROWDING * crowding
            + AOS_WEIGHT_BAND * band
    }

    /// Sector reach lines and the last placements.
    pub fn draw_debug(&self, sink: &mut dyn DebugSink) {
        for sector in 0..self.sectors {
            let end = self.origin + unit(self.sector_angle(sector)) * self.reach[sector];
            sink.line(self.origin, end, DebugColor::Blue);
        }
        for placement in &self.last {
            let half = Vec2::splat(0.2);
            sink.rect(placement.point - half, placement.point + half, DebugColor::Green);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelMap;
    use crate::sandbox::Sandbox;
    use std::collections::HashSet;

    fn request(agent: EntityId, position: Vec2) -> AosRequest {
        AosRequest {
            agent,
            position,
            priority: 1.0,
            optimal: 4.0,
            band: (1.0, 9.0),
            free_radius: 0,
        }
    }

    #[test]
    fn test_sectors_unique_while_capacity_allows() {
        let mut sandbox = Sandbox::new(&LevelMap::new(30, 30, 1.0));
        let origin = Vec2::new(15.0, 15.0);
        // Everyone starts bunched on the same side
        let agents: Vec<_> = (0..10)
            .map(|i| sandbox.spawn_agent(Vec2::new(20.0, 15.0 + i as f32 * 0.1), 0.3))
            .collect();

        let mut aos = AreaOfSight::new(8);
        aos.begin(origin, &sandbox, 8.0, 0.5);
        for &agent in &agents {
            aos.feed(request(agent, Vec2::new(20.0, 15.0)));
        }
        let placements = aos.place_end();
        assert_eq!(placements.len(), 10);
        let first_eight: HashSet<_> = placements.iter().take(8).map(|p| p.sector).collect();
        assert_eq!(first_eight.len(), 8);
        for p in &placements {
            assert!((p.point.distance(origin) - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_short_sectors_avoided() {
        // Target in a corridor running east-west
        let level = LevelMap::from_ascii(&[
            "####################",
            "#..................#",
            "####################",
        ]);
        let sandbox = Sandbox::new(&level);
        let mut world = hecs::World::new();
        let agents: Vec<EntityId> = (0..2).map(|_| world.spawn(())).collect();

        let origin = Vec2::new(10.5, 1.5);
        let mut aos = AreaOfSight::new(8);
        aos.begin(origin, &sandbox, 8.0, 0.2);
        aos.feed(request(agents[0], Vec2::new(12.0, 1.5)));
        aos.feed(request(agents[1], Vec2::new(12.0, 1.5)));
        let placements = aos.place_end();
        let sectors: HashSet<_> = placements.iter().map(|p| p.sector).collect();
        assert_eq!(sectors, HashSet::from([0, 4]));
    }

    #[test]
    fn test_free_radius_reserves_neighbours() {
        let sandbox = Sandbox::new(&LevelMap::new(30, 30, 1.0));
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let origin = Vec2::new(15.0, 15.0);
        let mut aos = AreaOfSight::new(8);
        aos.begin(origin, &sandbox, 8.0, 0.5);
        aos.feed(AosRequest {
            free_radius: 1,
            priority: 2.0,
            ..request(a, Vec2::new(20.0, 15.0))
        });
        // b's best sector by bearing is next to a's
        aos.feed(request(b, Vec2::new(19.0, 17.0)));
        let placements = aos.place_end();
        let sector_of = |agent| placements.iter().find(|p| p.agent == agent).map(|p| p.sector);
        assert_eq!(sector_of(a), Some(0));
        assert_eq!(sector_of(b), Some(2));
    }
}
