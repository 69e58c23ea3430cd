//! Squad coordination constants.

/// Number of angular sectors around a target for area-of-sight placement
pub const AOS_SECTORS: usize = 24;
/// Fewest sectors an area of sight can work with
pub const AOS_MIN_SECTORS: usize = 4;
/// Distance kept from walls when placing a member along a sector ray
pub const AOS_WALL_MARGIN: f32 = 0.5;
/// Weight of ray congestion in the sector score
pub const AOS_WEIGHT_CONGESTION: f32 = 2.0;
/// Weight of angular distance from the member's current bearing
pub const AOS_WEIGHT_BEARING: f32 = 1.0;
/// Weight of crowding from neighbouring assigned sectors
pub const AOS_WEIGHT_CROWDING: f32 = 0.5;
/// Weight of the distance band fit
pub const AOS_WEIGHT_BAND: f32 = 1.5;
/// A sector shorter than this fraction of the optimal distance is unusable
pub const AOS_MIN_BAND_FRACTION: f32 = 0.5;

/// Time with nobody seeing the target before the squad starts a search (seconds)
pub const SEARCH_CONSENSUS_TIME: f32 = 4.0;
/// Number of concentric search rings
pub const SEARCH_RINGS: usize = 3;
/// Radius step between search rings
pub const SEARCH_RING_STEP: f32 = 3.0;
/// Spacing of points along a search ring
pub const SEARCH_POINT_SPACING: f32 = 2.5;
/// Angular slots used to spread searchers (bits in the used-slot bitmap)
pub const SEARCH_SLOTS: u32 = 16;

/// Default help-call flood radius
pub const HELP_CALL_RADIUS: f32 = 20.0;
/// A squad sighting younger than this lets idle drones join battle directly (seconds)
pub const SQUAD_RECENT_SIGHTING: f32 = 2.0;

/// Maximum distance from the focus for drones to stay online
pub const AI_ACTIVE_RADIUS: f32 = 40.0;
