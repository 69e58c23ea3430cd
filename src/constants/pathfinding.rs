//! Grid search constants.

/// Fractional bits used by the path cost fixed-point format
pub const PATH_FIXED_SHIFT: u32 = 16;
/// Cost of one orthogonal step (1.0 in 16.16 fixed point)
pub const PATH_ORTHOGONAL_COST: u32 = 1 << PATH_FIXED_SHIFT;
/// Cost of one diagonal step (sqrt(2), truncated)
pub const PATH_DIAGONAL_COST: u32 = 92_681;
/// Subtracted from the octile heuristic so truncation never makes it overestimate
pub const PATH_HEURISTIC_SLACK: u32 = 4;
/// Default search limit in cells
pub const PATH_DEFAULT_MAX_LENGTH: u32 = 256;
/// Default extra cost (in cells) for entering an evade zone cell
pub const PATH_DEFAULT_EVADE_COST: u32 = 8;
/// Path searches resolved per tick before the rest wait for the next tick
pub const PATH_SEARCHES_PER_TICK: usize = 16;
