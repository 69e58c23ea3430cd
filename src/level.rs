//! Level topology as the AI sees it: a walkable grid, rooms, and room adjacency.
//!
//! Level generation lives elsewhere. The AI only needs wall lookups,
//! world/cell conversion, `room_of` and the room graph for help-call flooding.

use std::collections::{BTreeSet, VecDeque};

use glam::{IVec2, Vec2};

/// Index of a room inside a [`LevelMap`].
pub type RoomId = usize;

/// A rectangle of cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Check if a cell is inside this rectangle
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One grid cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub wall: bool,
    /// Step weight for path costs (1 = normal floor)
    pub weight: u8,
    pub room: Option<RoomId>,
}

impl Cell {
    pub const FLOOR: Cell = Cell {
        wall: false,
        weight: 1,
        room: None,
    };
    pub const WALL: Cell = Cell {
        wall: true,
        weight: 0,
        room: None,
    };
}

/// A connected area of the level
#[derive(Clone, Debug)]
pub struct Room {
    pub id: RoomId,
    /// Bounding box of the room's cells
    pub bounds: Rect,
    /// World-space centroid of the room's cells
    pub center: Vec2,
    /// Rooms reachable through doors or corridors without crossing another room
    pub neighbours: Vec<RoomId>,
}

pub struct LevelMap {
    pub width: usize,
    pub height: usize,
    /// World units per cell
    pub cell_size: f32,
    cells: Vec<Cell>,
    rooms: Vec<Room>,
}

impl LevelMap {
    /// An open level with no rooms.
    pub fn new(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![Cell::FLOOR; width * height],
            rooms: Vec::new(),
        }
    }

    /// Build a level from ASCII rows (row 0 is y = 0).
    ///
    /// `#` wall, `.` floor, `+` door (floor outside any room), `~` rough floor
    /// (weight 3), `a`-`z` floor belonging to the room with that letter.
    /// Short rows are padded with walls.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut level = Self::new(width, height, 1.0);

        let labels: BTreeSet<char> = rows
            .iter()
            .flat_map(|r| r.chars())
            .filter(|c| c.is_ascii_lowercase())
            .collect();
        let room_index = |c: char| labels.iter().position(|&l| l == c);

        for (y, row) in rows.iter().enumerate() {
            let mut chars = row.chars();
            for x in 0..width {
                let cell = match chars.next() {
                    Some('#') | None => Cell::WALL,
                    Some('~') => Cell {
                        weight: 3,
                        ..Cell::FLOOR
                    },
                    Some(c) if c.is_ascii_lowercase() => Cell {
                        room: room_index(c),
                        ..Cell::FLOOR
                    },
                    Some(_) => Cell::FLOOR,
                };
                level.cells[y * width + x] = cell;
            }
        }

        level.rooms = (0..labels.len())
            .map(|id| Room {
                id,
                bounds: Rect::new(0, 0, 0, 0),
                center: Vec2::ZERO,
                neighbours: Vec::new(),
            })
            .collect();
        level.rebuild_room_graph();
        level
    }

    pub fn size(&self) -> IVec2 {
        IVec2::new(self.width as i32, self.height as i32)
    }

    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width as i32 && cell.y < self.height as i32
    }

    pub fn get(&self, cell: IVec2) -> Option<&Cell> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some(&self.cells[cell.y as usize * self.width + cell.x as usize])
    }

    pub fn get_mut(&mut self, cell: IVec2) -> Option<&mut Cell> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some(&mut self.cells[cell.y as usize * self.width + cell.x as usize])
    }

    /// Out-of-bounds cells count as walls.
    pub fn is_wall(&self, cell: IVec2) -> bool {
        self.get(cell).map_or(true, |c| c.wall)
    }

    #[inline]
    pub fn is_walkable(&self, cell: IVec2) -> bool {
        !self.is_wall(cell)
    }

    pub fn set_wall(&mut self, cell: IVec2, wall: bool) {
        if let Some(c) = self.get_mut(cell) {
            *c = if wall {
                Cell::WALL
            } else {
                Cell {
                    room: c.room,
                    ..Cell::FLOOR
                }
            };
        }
    }

    /// Cell containing a world position.
    pub fn cell_coord(&self, position: Vec2) -> IVec2 {
        (position / self.cell_size).floor().as_ivec2()
    }

    /// World position of a cell's center.
    pub fn cell_center(&self, cell: IVec2) -> Vec2 {
        (cell.as_vec2() + Vec2::splat(0.5)) * self.cell_size
    }

    pub fn room_of(&self, position: Vec2) -> Option<RoomId> {
        self.get(self.cell_coord(position)).and_then(|c| c.room)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Mark the walkable cells of `rect` as a new room and rebuild adjacency.
    pub fn add_room(&mut self, rect: Rect) -> RoomId {
        let id = self.rooms.len();
        self.rooms.push(Room {
            id,
            bounds: rect,
            center: Vec2::ZERO,
            neighbours: Vec::new(),
        });
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                if let Some(cell) = self.get_mut(IVec2::new(x, y)) {
                    if !cell.wall {
                        cell.room = Some(id);
                    }
                }
            }
        }
        self.rebuild_room_graph();
        id
    }

    /// Recompute room bounds, centroids and adjacency from the cells.
    ///
    /// Two rooms are neighbours when a walk over room-less floor (doors,
    /// corridors) connects them, or when their cells touch directly.
    pub fn rebuild_room_graph(&mut self) {
        let room_count = self.rooms.len();
        let mut sums = vec![(Vec2::ZERO, 0usize); room_count];
        let mut mins = vec![IVec2::MAX; room_count];
        let mut maxs = vec![IVec2::MIN; room_count];

        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let cell = IVec2::new(x, y);
                if let Some(id) = self.get(cell).and_then(|c| c.room) {
                    sums[id].0 += self.cell_center(cell);
                    sums[id].1 += 1;
                    mins[id] = mins[id].min(cell);
                    maxs[id] = maxs[id].max(cell);
                }
            }
        }

        for id in 0..room_count {
            let neighbours = self.flood_neighbours(id);
            let room = &mut self.rooms[id];
            if sums[id].1 > 0 {
                room.center = sums[id].0 / sums[id].1 as f32;
                room.bounds = Rect::new(
                    mins[id].x,
                    mins[id].y,
                    maxs[id].x - mins[id].x + 1,
                    maxs[id].y - mins[id].y + 1,
                );
            }
            room.neighbours = neighbours;
        }
    }

    fn flood_neighbours(&self, id: RoomId) -> Vec<RoomId> {
        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        let mut found = BTreeSet::new();

        for (index, cell) in self.cells.iter().enumerate() {
            if cell.room == Some(id) {
                seen[index] = true;
                queue.push_back(index);
            }
        }

        while let Some(index) = queue.pop_front() {
            let here = IVec2::new((index % self.width) as i32, (index / self.width) as i32);
            for step in [IVec2::X, IVec2::NEG_X, IVec2::Y, IVec2::NEG_Y] {
                let next = here + step;
                let Some(cell) = self.get(next) else {
                    continue;
                };
                if cell.wall {
                    continue;
                }
                let next_index = next.y as usize * self.width + next.x as usize;
                if seen[next_index] {
                    continue;
                }
                seen[next_index] = true;
                match cell.room {
                    Some(other) if other != id => {
                        found.insert(other);
                    }
                    _ => queue.push_back(next_index),
                }
            }
        }

        found.into_iter().collect()
    }

    /// Path cost grid for the pathfinder: 0 = blocked, otherwise the step weight.
    pub fn cost_grid(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|c| if c.wall { 0 } else { c.weight.max(1) })
            .collect()
    }
}
