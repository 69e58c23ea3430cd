//! Grid A* search.
//!
//! Costs are 16.16 fixed point so that diagonal steps (sqrt 2) and the octile
//! heuristic stay commensurable without floating point drift. The caller's
//! grid is padded with a one-cell blocked border internally, which lets the
//! inner loop index neighbours without bounds checks.

pub mod service;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::constants::{PATH_DIAGONAL_COST, PATH_HEURISTIC_SLACK, PATH_ORTHOGONAL_COST};

pub use service::{EvadeZone, PathOutcome, PathRequest, PathRequestId, PathService};

/// Neighbour order: 4 orthogonal directions, then 4 diagonals.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    /// Allow 8-directional moves
    pub diagonal: bool,
    /// Allow diagonal moves that clip a blocked orthogonal neighbour
    pub corner_cutting: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            diagonal: true,
            corner_cutting: false,
        }
    }
}

/// Soft-cost zone around a hazard, in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evade {
    pub center: IVec2,
    /// Chebyshev radius of the penalized area
    pub radius: i32,
    /// Extra cost in cells for entering a penalized cell
    pub cost: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathArgs {
    pub src: IVec2,
    pub dst: IVec2,
    /// Longest accepted path, in cells of geometric length. Cell weights and
    /// evade penalties don't count toward it.
    pub max_length: u32,
    pub evade: Option<Evade>,
}

/// Result of a grid search
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridPath {
    pub not_found: bool,
    /// Cells from src to dst inclusive, or just `[src]` when not found
    pub cells: Vec<IVec2>,
    /// Fixed-point cost of the path
    pub cost: u32,
}

impl GridPath {
    fn not_found(src: IVec2) -> Self {
        Self {
            not_found: true,
            cells: vec![src],
            cost: 0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct ScoredNode {
    f_score: u32,
    h_score: u32,
    index: u32,
}

// BinaryHeap is a max-heap, so we reverse the ordering for min-heap behavior.
// Ties break on h, then on cell index, so equal-cost searches are deterministic.
impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct PathFinder {
    options: PathOptions,
    /// Caller-visible grid size
    size: IVec2,
    /// Padded row stride
    stride: usize,
    weights: Vec<u8>,
    /// Allowed move directions per cell, one bit per `DIRECTIONS` entry
    masks: Vec<u8>,
    offsets: [isize; 8],
    g_score: Vec<u32>,
    /// Unweighted fixed-point length of the best route to a cell
    length: Vec<u32>,
    parent: Vec<u32>,
    /// Search generation that last touched g_score/parent for a cell
    open_stamp: Vec<u32>,
    closed_stamp: Vec<u32>,
    generation: u32,
    open_set: BinaryHeap<ScoredNode>,
    last_expanded: usize,
}

impl PathFinder {
    pub fn new(options: PathOptions) -> Self {
        Self {
            options,
            size: IVec2::ZERO,
            stride: 2,
            weights: Vec::new(),
            masks: Vec::new(),
            offsets: [0; 8],
            g_score: Vec::new(),
            length: Vec::new(),
            parent: Vec::new(),
            open_stamp: Vec::new(),
            closed_stamp: Vec::new(),
            generation: 0,
            open_set: BinaryHeap::new(),
            last_expanded: 0,
        }
    }

    pub fn options(&self) -> PathOptions {
        self.options
    }

    pub fn size(&self) -> IVec2 {
        self.size
    }

    /// Number of nodes closed by the most recent search.
    pub fn last_expanded(&self) -> usize {
        self.last_expanded
    }

    /// Replace the whole grid. `cost_grid` is row-major, 0 = blocked,
    /// any other value = walkable with that step weight.
    pub fn update(&mut self, size: IVec2, cost_grid: &[u8]) {
        puffin::profile_function!();
        assert!(size.x >= 0 && size.y >= 0, "negative grid size {size}");
        assert_eq!(
            cost_grid.len(),
            (size.x * size.y) as usize,
            "cost grid does not match size {size}"
        );

        self.size = size;
        self.stride = size.x as usize + 2;
        let padded = self.stride * (size.y as usize + 2);

        self.weights.clear();
        self.weights.resize(padded, 0);
        for y in 0..size.y as usize {
            let row = &cost_grid[y * size.x as usize..(y + 1) * size.x as usize];
            let start = (y + 1) * self.stride + 1;
            self.weights[start..start + row.len()].copy_from_slice(row);
        }

        let stride = self.stride as isize;
        for (offset, (dx, dy)) in self.offsets.iter_mut().zip(DIRECTIONS) {
            *offset = dx as isize + dy as isize * stride;
        }

        self.masks.clear();
        self.masks.resize(padded, 0);
        for index in 0..padded {
            if self.weights[index] == 0 {
                continue;
            }
            self.masks[index] = self.direction_mask(index);
        }

        self.g_score.clear();
        self.g_score.resize(padded, u32::MAX);
        self.length.clear();
        self.length.resize(padded, u32::MAX);
        self.parent.clear();
        self.parent.resize(padded, u32::MAX);
        self.open_stamp.clear();
        self.open_stamp.resize(padded, 0);
        self.closed_stamp.clear();
        self.closed_stamp.resize(padded, 0);
        self.generation = 0;
    }

    fn direction_mask(&self, index: usize) -> u8 {
        let walkable = |d: usize| {
            let n = index as isize + self.offsets[d];
            self.weights[n as usize] != 0
        };

        let mut mask = 0u8;
        for d in 0..4 {
            if walkable(d) {
                mask |= 1 << d;
            }
        }
        if !self.options.diagonal {
            return mask;
        }
        for d in 4..8 {
            if !walkable(d) {
                continue;
            }
            let (dx, dy) = DIRECTIONS[d];
            let side_x = DIRECTIONS.iter().position(|&v| v == (dx, 0)).unwrap_or(0);
            let side_y = DIRECTIONS.iter().position(|&v| v == (0, dy)).unwrap_or(0);
            if self.options.corner_cutting || (walkable(side_x) && walkable(side_y)) {
                mask |= 1 << d;
            }
        }
        mask
    }

    /// Whether a caller-space cell is walkable.
    pub fn is_walkable(&self, cell: IVec2) -> bool {
        self.in_range(cell) && self.weights[self.to_index(cell)] != 0
    }

    #[inline]
    fn in_range(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.size.x && cell.y < self.size.y
    }

    #[inline]
    fn to_index(&self, cell: IVec2) -> usize {
        (cell.y as usize + 1) * self.stride + cell.x as usize + 1
    }

    #[inline]
    fn to_cell(&self, index: usize) -> IVec2 {
        IVec2::new(
            (index % self.stride) as i32 - 1,
            (index / self.stride) as i32 - 1,
        )
    }

    /// Octile distance heuristic
    fn heuristic(&self, from: IVec2, to: IVec2) -> u32 {
        let d = (from - to).abs();
        let diagonal = d.x.min(d.y) as u32;
        let straight = (d.x.max(d.y) - d.x.min(d.y)) as u32;
        let octile = diagonal * PATH_DIAGONAL_COST + straight * PATH_ORTHOGONAL_COST;
        if self.options.diagonal {
            octile.saturating_sub(PATH_HEURISTIC_SLACK)
        } else {
            // Without diagonals Manhattan distance is the tighter admissible bound
            ((d.x + d.y) as u32 * PATH_ORTHOGONAL_COST).saturating_sub(PATH_HEURISTIC_SLACK)
        }
    }

    /// Find a path from `src` to `dst`.
    pub fn find_path(&mut self, args: &PathArgs) -> GridPath {
        puffin::profile_function!();
        let Some((cost, goal)) = self.search(args) else {
            return GridPath::not_found(args.src);
        };
        GridPath {
            not_found: false,
            cells: self.reconstruct_path(self.to_index(args.src), goal),
            cost,
        }
    }

    /// Fixed-point cost of the best path, or `None` when there is none.
    pub fn find_length(&mut self, args: &PathArgs) -> Option<u32> {
        puffin::profile_function!();
        self.search(args).map(|(cost, _)| cost)
    }

    fn search(&mut self, args: &PathArgs) -> Option<(u32, usize)> {
        assert!(
            self.in_range(args.src) && self.in_range(args.dst),
            "path endpoints {} -> {} outside grid {}",
            args.src,
            args.dst,
            self.size
        );
        self.last_expanded = 0;

        let src = self.to_index(args.src);
        let dst = self.to_index(args.dst);
        if self.weights[src] == 0 || self.weights[dst] == 0 {
            return None;
        }
        if src == dst {
            return Some((0, dst));
        }

        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.open_stamp.fill(0);
            self.closed_stamp.fill(0);
            self.generation = 1;
        }
        let generation = self.generation;
        let max_length = args.max_length.saturating_mul(PATH_ORTHOGONAL_COST);

        self.open_set.clear();
        self.g_score[src] = 0;
        self.length[src] = 0;
        self.parent[src] = u32::MAX;
        self.open_stamp[src] = generation;
        let h = self.heuristic(args.src, args.dst);
        self.open_set.push(ScoredNode {
            f_score: h,
            h_score: h,
            index: src as u32,
        });

        while let Some(current) = self.open_set.pop() {
            let index = current.index as usize;
            if self.closed_stamp[index] == generation {
                continue;
            }
            self.closed_stamp[index] = generation;
            self.last_expanded += 1;

            if index == dst {
                self.open_set.clear();
                return Some((self.g_score[dst], dst));
            }

            let current_g = self.g_score[index];
            let current_length = self.length[index];
            let mask = self.masks[index];
            for d in 0..8 {
                if mask & (1 << d) == 0 {
                    continue;
                }
                let neighbor = (index as isize + self.offsets[d]) as usize;
                if self.closed_stamp[neighbor] == generation {
                    continue;
                }

                let step = if d < 4 {
                    PATH_ORTHOGONAL_COST
                } else {
                    PATH_DIAGONAL_COST
                };
                let mut cost = step.saturating_mul(self.weights[neighbor] as u32);
                let cell = self.to_cell(neighbor);
                if let Some(evade) = args.evade {
                    let d = (cell - evade.center).abs();
                    if d.x.max(d.y) <= evade.radius {
                        cost = cost.saturating_add(evade.cost.saturating_mul(PATH_ORTHOGONAL_COST));
                    }
                }

                // Weights and evade penalties steer the search but don't count
                // toward the length limit
                let tentative_length = current_length.saturating_add(step);
                if tentative_length > max_length {
                    continue;
                }
                let tentative_g = current_g.saturating_add(cost);
                if self.open_stamp[neighbor] == generation && tentative_g >= self.g_score[neighbor] {
                    continue;
                }

                self.open_stamp[neighbor] = generation;
                self.g_score[neighbor] = tentative_g;
                self.length[neighbor] = tentative_length;
                self.parent[neighbor] = index as u32;
                let h = self.heuristic(cell, args.dst);
                self.open_set.push(ScoredNode {
                    f_score: tentative_g.saturating_add(h),
                    h_score: h,
                    index: neighbor as u32,
                });
            }
        }

        None
    }

    fn reconstruct_path(&self, src: usize, goal: usize) -> Vec<IVec2> {
        let mut path = vec![self.to_cell(goal)];
        let mut current = goal;
        while current != src {
            current = self.parent[current] as usize;
            path.push(self.to_cell(current));
        }
        path.reverse();
        path
    }
}

/// Convert a fixed-point path cost to cells.
pub fn cost_to_cells(cost: u32) -> f32 {
    cost as f32 / PATH_ORTHOGONAL_COST as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn make_finder(width: i32, height: i32, walls: &[(i32, i32)], options: PathOptions) -> PathFinder {
        let mut grid = vec![1u8; (width * height) as usize];
        for &(x, y) in walls {
            grid[(y * width + x) as usize] = 0;
        }
        let mut finder = PathFinder::new(options);
        finder.update(IVec2::new(width, height), &grid);
        finder
    }

    fn args(src: (i32, i32), dst: (i32, i32), max_length: u32) -> PathArgs {
        PathArgs {
            src: IVec2::new(src.0, src.1),
            dst: IVec2::new(dst.0, dst.1),
            max_length,
            evade: None,
        }
    }

    fn assert_valid(finder: &PathFinder, path: &GridPath) {
        for cell in &path.cells {
            assert!(finder.is_walkable(*cell), "{cell} is not walkable");
        }
        for pair in path.cells.windows(2) {
            let d = (pair[1] - pair[0]).abs();
            assert!(d.x.max(d.y) == 1, "{} -> {} is not adjacent", pair[0], pair[1]);
        }
    }

    fn wall_with_gap() -> PathFinder {
        let walls: Vec<_> = (0..=8).map(|y| (5, y)).collect();
        make_finder(10, 10, &walls, PathOptions::default())
    }

    #[test]
    fn test_routes_through_gap() {
        let mut finder = wall_with_gap();
        let path = finder.find_path(&args((0, 0), (9, 0), 256));

        assert!(!path.not_found);
        assert_eq!(path.cells.first(), Some(&IVec2::new(0, 0)));
        assert_eq!(path.cells.last(), Some(&IVec2::new(9, 0)));
        assert!(path.cells.contains(&IVec2::new(5, 9)));
        assert!(cost_to_cells(path.cost) > 9.0);
        assert_valid(&finder, &path);
    }

    #[test]
    fn test_same_cell_is_found() {
        let mut finder = wall_with_gap();
        let path = finder.find_path(&args((2, 2), (2, 2), 10));
        assert!(!path.not_found);
        assert_eq!(path.cells, vec![IVec2::new(2, 2)]);
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn test_max_length_aborts() {
        let mut finder = wall_with_gap();
        let path = finder.find_path(&args((0, 0), (9, 0), 12));
        assert!(path.not_found);
        assert_eq!(path.cells, vec![IVec2::new(0, 0)]);
        assert_eq!(finder.find_length(&args((0, 0), (9, 0), 12)), None);
    }

    #[test]
    fn test_blocked_goal_not_found() {
        let mut finder = wall_with_gap();
        let path = finder.find_path(&args((0, 0), (5, 3), 256));
        assert!(path.not_found);
        assert_eq!(path.cells, vec![IVec2::new(0, 0)]);
    }

    #[test]
    fn test_diagonal_cost() {
        let mut finder = make_finder(5, 5, &[], PathOptions::default());
        assert_eq!(finder.find_length(&args((0, 0), (3, 3), 20)), Some(3 * PATH_DIAGONAL_COST));
        assert_eq!(finder.find_length(&args((0, 0), (3, 0), 20)), Some(3 * PATH_ORTHOGONAL_COST));
    }

    #[test]
    fn test_four_directional() {
        let options = PathOptions {
            diagonal: false,
            corner_cutting: false,
        };
        let mut finder = make_finder(5, 5, &[], options);
        let path = finder.find_path(&args((0, 0), (2, 2), 20));
        assert_eq!(path.cost, 4 * PATH_ORTHOGONAL_COST);
        for pair in path.cells.windows(2) {
            let d = (pair[1] - pair[0]).abs();
            assert_eq!(d.x + d.y, 1);
        }
    }

    #[test]
    fn test_corner_cutting_suppressed() {
        let mut strict = make_finder(3, 3, &[(1, 0)], PathOptions::default());
        assert_eq!(strict.find_length(&args((0, 0), (1, 1), 10)), Some(2 * PATH_ORTHOGONAL_COST));

        let options = PathOptions {
            diagonal: true,
            corner_cutting: true,
        };
        let mut loose = make_finder(3, 3, &[(1, 0)], options);
        assert_eq!(loose.find_length(&args((0, 0), (1, 1), 10)), Some(PATH_DIAGONAL_COST));
    }

    #[test]
    fn test_weighted_cells_are_avoided() {
        let mut grid = vec![1u8; 25];
        // Heavy band across the middle row except the right edge
        for x in 0..4 {
            grid[2 * 5 + x] = 9;
        }
        let mut finder = PathFinder::new(PathOptions::default());
        finder.update(IVec2::new(5, 5), &grid);
        let path = finder.find_path(&args((0, 0), (0, 4), 50));
        assert!(path.cells.contains(&IVec2::new(4, 2)));
    }

    #[test]
    fn test_evade_zone_bias() {
        let mut finder = make_finder(7, 7, &[], PathOptions::default());
        let plain = finder.find_path(&args((0, 3), (6, 3), 50));
        assert!(plain.cells.contains(&IVec2::new(3, 3)));

        let mut evading = args((0, 3), (6, 3), 50);
        evading.evade = Some(Evade {
            center: IVec2::new(3, 3),
            radius: 1,
            cost: 10,
        });
        let path = finder.find_path(&evading);
        assert!(!path.not_found);
        assert_valid(&finder, &path);
        for cell in &path.cells {
            let d = (*cell - IVec2::new(3, 3)).abs();
            assert!(d.x.max(d.y) > 1, "path enters evade zone at {cell}");
        }
    }

    #[test]
    fn test_evade_is_not_a_wall() {
        // The only route passes the hazard, so it is still taken
        let walls: Vec<_> = (0..7).filter(|&y| y != 3).map(|y| (3, y)).collect();
        let mut finder = make_finder(7, 7, &walls, PathOptions::default());
        let mut evading = args((0, 3), (6, 3), 100);
        evading.evade = Some(Evade {
            center: IVec2::new(3, 3),
            radius: 0,
            cost: 20,
        });
        let path = finder.find_path(&evading);
        assert!(!path.not_found);
        assert!(cost_to_cells(path.cost) >= 26.0);
    }

    #[test]
    fn test_length_limit_ignores_penalties() {
        let walls: Vec<_> = (0..7).filter(|&y| y != 3).map(|y| (3, y)).collect();
        let mut finder = make_finder(7, 7, &walls, PathOptions::default());
        // Six steps long, but the hazard makes it cost far more than eight cells
        let mut evading = args((0, 3), (6, 3), 8);
        evading.evade = Some(Evade {
            center: IVec2::new(3, 3),
            radius: 0,
            cost: 20,
        });
        let path = finder.find_path(&evading);
        assert!(!path.not_found);
        assert!(cost_to_cells(path.cost) > 8.0);

        evading.max_length = 5;
        assert!(finder.find_path(&evading).not_found);
    }

    #[test]
    fn test_random_grids_valid_and_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..40 {
            let (w, h) = (rng.gen_range(4..16), rng.gen_range(4..16));
            let grid: Vec<u8> = (0..w * h).map(|_| u8::from(rng.gen_bool(0.75))).collect();
            let mut finder = PathFinder::new(PathOptions::default());
            finder.update(IVec2::new(w, h), &grid);

            for _ in 0..10 {
                let request = PathArgs {
                    src: IVec2::new(rng.gen_range(0..w), rng.gen_range(0..h)),
                    dst: IVec2::new(rng.gen_range(0..w), rng.gen_range(0..h)),
                    max_length: 64,
                    evade: None,
                };
                let first = finder.find_path(&request);
                let second = finder.find_path(&request);
                assert_eq!(first, second);
                if first.not_found {
                    assert_eq!(first.cells, vec![request.src]);
                    continue;
                }
                assert_valid(&finder, &first);
                assert_eq!(first.cells.first(), Some(&request.src));
                assert_eq!(first.cells.last(), Some(&request.dst));
                assert_eq!(finder.find_length(&request), Some(first.cost));
            }
        }
    }

    #[test]
    fn test_update_replaces_grid() {
        let mut finder = make_finder(4, 1, &[], PathOptions::default());
        assert!(finder.find_length(&args((0, 0), (3, 0), 10)).is_some());
        finder.update(IVec2::new(4, 1), &[1, 1, 0, 1]);
        assert_eq!(finder.find_length(&args((0, 0), (3, 0), 10)), None);
    }
}
