//! Request/poll front end over [`PathFinder`].
//!
//! Requests are queued in world space and resolved in bulk by `process`,
//! a bounded number per tick. Callers keep the returned id and poll for the
//! outcome, so the search could move off-thread without touching call sites.

use std::collections::{HashMap, VecDeque};

use glam::{IVec2, Vec2};

use super::{Evade, PathArgs, PathFinder, PathOptions};
use crate::level::LevelMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathRequestId(u64);

/// World-space hazard to keep away from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvadeZone {
    pub center: Vec2,
    pub radius: f32,
    /// Extra cost in cells for each penalized cell entered
    pub cost: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathRequest {
    pub start: Vec2,
    pub goal: Vec2,
    /// Longest accepted path length in cells
    pub max_length: u32,
    pub evade: Option<EvadeZone>,
}

/// Resolved request
#[derive(Clone, Debug, PartialEq)]
pub struct PathOutcome {
    pub not_found: bool,
    /// Polyline from start to goal inclusive, or just `[start]` when not found
    pub points: Vec<Vec2>,
    pub cost: u32,
}

pub struct PathService {
    finder: PathFinder,
    queue: VecDeque<(PathRequestId, PathRequest)>,
    ready: HashMap<PathRequestId, PathOutcome>,
    next_id: u64,
    budget: usize,
    issued: u64,
}

impl PathService {
    pub fn new(options: PathOptions, budget: usize) -> Self {
        Self {
            finder: PathFinder::new(options),
            queue: VecDeque::new(),
            ready: HashMap::new(),
            next_id: 1,
            budget: budget.max(1),
            issued: 0,
        }
    }

    /// Rebuild the search grid from the level. Queued requests stay queued.
    pub fn rebuild(&mut self, level: &LevelMap) {
        self.finder.update(level.size(), &level.cost_grid());
    }

    pub fn request(&mut self, request: PathRequest) -> PathRequestId {
        let id = PathRequestId(self.next_id);
        self.next_id += 1;
        self.issued += 1;
        self.queue.push_back((id, request));
        id
    }

    /// Drop a request whether it is queued or already resolved.
    pub fn cancel(&mut self, id: PathRequestId) {
        self.queue.retain(|(queued, _)| *queued != id);
        self.ready.remove(&id);
    }

    /// Take the outcome of a resolved request.
    pub fn poll(&mut self, id: PathRequestId) -> Option<PathOutcome> {
        self.ready.remove(&id)
    }

    pub fn is_queued(&self, id: PathRequestId) -> bool {
        self.queue.iter().any(|(queued, _)| *queued == id)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Total requests issued since creation.
    pub fn issued_count(&self) -> u64 {
        self.issued
    }

    /// Resolve up to the per-tick budget of queued requests.
    pub fn process(&mut self, level: &LevelMap) {
        puffin::profile_function!();
        for _ in 0..self.budget {
            let Some((id, request)) = self.queue.pop_front() else {
                break;
            };
            let outcome = self.resolve(level, &request);
            if outcome.not_found {
                tracing::trace!(
                    "path {:?} not found: {:?} -> {:?}",
                    id,
                    request.start,
                    request.goal
                );
            }
            self.ready.insert(id, outcome);
        }
    }

    /// Resolve a request immediately, bypassing the queue.
    pub fn resolve(&mut self, level: &LevelMap, request: &PathRequest) -> PathOutcome {
        let not_found = PathOutcome {
            not_found: true,
            points: vec![request.start],
            cost: 0,
        };
        if self.finder.size() != level.size() {
            self.rebuild(level);
        }

        let Some(src) = nearest_walkable(level, level.cell_coord(request.start)) else {
            return not_found;
        };
        let goal_cell = level.cell_coord(request.goal);
        let Some(dst) = nearest_walkable(level, goal_cell) else {
            return not_found;
        };

        let evade = request.evade.map(|zone| Evade {
            center: level.cell_coord(zone.center),
            radius: (zone.radius / level.cell_size).ceil() as i32,
            cost: zone.cost,
        });
        let path = self.finder.find_path(&PathArgs {
            src,
            dst,
            max_length: request.max_length,
            evade,
        });
        if path.not_found {
            return not_found;
        }

        let goal = if dst == goal_cell {
            request.goal
        } else {
            level.cell_center(dst)
        };
        let mut points = Vec::with_capacity(path.cells.len());
        points.push(request.start);
        for cell in corners(&path.cells) {
            points.push(level.cell_center(cell));
        }
        points.push(goal);

        PathOutcome {
            not_found: false,
            points,
            cost: path.cost,
        }
    }
}

/// The cell itself when walkable, else the first walkable neighbour.
fn nearest_walkable(level: &LevelMap, cell: IVec2) -> Option<IVec2> {
    if level.is_walkable(cell) {
        return Some(cell);
    }
    [
        IVec2::X,
        IVec2::NEG_X,
        IVec2::Y,
        IVec2::NEG_Y,
        IVec2::ONE,
        IVec2::NEG_ONE,
        IVec2::new(1, -1),
        IVec2::new(-1, 1),
    ]
    .into_iter()
    .map(|step| cell + step)
    .find(|&next| level.is_walkable(next))
}

/// Interior cells where the path changes direction.
fn corners(cells: &[IVec2]) -> impl Iterator<Item = IVec2> + '_ {
    cells
        .windows(3)
        .filter(|w| w[1] - w[0] != w[2] - w[1])
        .map(|w| w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor_level() -> LevelMap {
        LevelMap::from_ascii(&[
            "#########",
            "#.......#",
            "#######.#",
            "#.......#",
            "#########",
        ])
    }

    fn request(start: Vec2, goal: Vec2) -> PathRequest {
        PathRequest {
            start,
            goal,
            max_length: 64,
            evade: None,
        }
    }

    #[test]
    fn test_request_poll_cycle() {
        let level = corridor_level();
        let mut service = PathService::new(PathOptions::default(), 4);
        service.rebuild(&level);

        let id = service.request(request(Vec2::new(1.5, 1.5), Vec2::new(1.5, 3.5)));
        assert!(service.is_queued(id));
        assert!(service.poll(id).is_none());

        service.process(&level);
        let outcome = service.poll(id).map(|o| (o.not_found, o.points));
        let Some((false, points)) = outcome else {
            panic!("expected a path, got {outcome:?}");
        };
        assert_eq!(points.first(), Some(&Vec2::new(1.5, 1.5)));
        assert_eq!(points.last(), Some(&Vec2::new(1.5, 3.5)));
        // The corridor turns at the right end
        assert!(points.iter().any(|p| p.x > 6.0));
        assert!(service.poll(id).is_none());
    }

    #[test]
    fn test_budget_limits_resolution() {
        let level = corridor_level();
        let mut service = PathService::new(PathOptions::default(), 1);
        service.rebuild(&level);
        let a = service.request(request(Vec2::new(1.5, 1.5), Vec2::new(5.5, 1.5)));
        let b = service.request(request(Vec2::new(1.5, 1.5), Vec2::new(6.5, 1.5)));
        service.process(&level);
        assert!(service.poll(a).is_some());
        assert!(service.is_queued(b));
        assert_eq!(service.issued_count(), 2);
    }

    #[test]
    fn test_cancel_drops_request() {
        let level = corridor_level();
        let mut service = PathService::new(PathOptions::default(), 4);
        let id = service.request(request(Vec2::new(1.5, 1.5), Vec2::new(5.5, 1.5)));
        service.cancel(id);
        service.process(&level);
        assert!(service.poll(id).is_none());
        assert_eq!(service.pending_count(), 0);
    }

    #[test]
    fn test_unreachable_goal_returns_start() {
        let level = LevelMap::from_ascii(&["#####", "#.#.#", "#####"]);
        let mut service = PathService::new(PathOptions::default(), 4);
        let outcome = service.resolve(&level, &request(Vec2::new(1.5, 1.5), Vec2::new(3.5, 1.5)));
        assert!(outcome.not_found);
        assert_eq!(outcome.points, vec![Vec2::new(1.5, 1.5)]);
    }

    #[test]
    fn test_straight_path_has_no_interior_points() {
        let level = corridor_level();
        let mut service = PathService::new(PathOptions::default(), 4);
        let outcome = service.resolve(&level, &request(Vec2::new(1.5, 1.5), Vec2::new(6.5, 1.5)));
        assert_eq!(outcome.points, vec![Vec2::new(1.5, 1.5), Vec2::new(6.5, 1.5)]);
    }
}
