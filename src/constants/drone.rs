//! State machine tuning.

// SUSPECT
/// Confidence gained per second while the target is visible within optimal range
pub const SUSPECT_GAIN_OPTIMAL: f32 = 1.2;
/// Confidence gained per second while the target is visible further away
pub const SUSPECT_GAIN_FAR: f32 = 0.45;
/// Confidence lost per second while nothing is visible
pub const SUSPECT_DECAY: f32 = 0.25;
/// Confidence at which the drone starts moving toward the last known position
pub const SUSPECT_CHASE_THRESHOLD: f32 = 0.45;
/// Confidence below which suspicion is dropped
pub const SUSPECT_FORGET: f32 = 0.02;
/// Initial confidence from a last known position
pub const SUSPECT_INITIAL_LAST_KNOWN: f32 = 0.2;
/// Initial confidence from a fresh sighting
pub const SUSPECT_INITIAL_SIGHTING: f32 = 0.1;
/// Initial confidence when answering a help-call
pub const SUSPECT_HELP_CALL_CONFIDENCE: f32 = 0.5;
/// Initial confidence when answering a high priority help-call
pub const SUSPECT_HIGH_PRIORITY_CONFIDENCE: f32 = 0.8;

// BATTLE
/// Delay between entering battle and the first shot (seconds)
pub const BATTLE_FIRST_SHOT_DELAY: f32 = 0.6;
/// Time without sight after which the lead estimator is cleared (seconds)
pub const BATTLE_LEAD_RESET_TIME: f32 = 1.5;
/// Default chase-wait throttle before pursuing a hidden target (seconds)
pub const BATTLE_CHASE_WAIT: f32 = 0.8;
/// How far ahead the target's last velocity is extrapolated (seconds)
pub const BATTLE_LEAD_TIME: f32 = 0.6;
/// Longest extrapolation distance when chasing
pub const BATTLE_LEAD_MAX: f32 = 3.0;
/// Chase failures before handing off to search
pub const BATTLE_MAX_CHASE_FAILURES: u32 = 3;
/// Half width of the stand-off band around the optimal distance
pub const BATTLE_STANDOFF_TOLERANCE: f32 = 1.0;
/// Distance of a single retreat step
pub const BATTLE_RETREAT_DISTANCE: f32 = 2.5;
/// A camper without sight of its target gives up after this long (seconds)
pub const CAMPER_GIVE_UP_TIME: f32 = 6.0;

// SEARCH
/// Dwell at each search waypoint (seconds)
pub const SEARCH_DWELL: f32 = 1.0;
/// Dwell at the final search waypoint (seconds)
pub const SEARCH_FINAL_DWELL: f32 = 3.0;
/// Suspicion carried into a search
pub const SEARCH_INITIAL_SUSPICION: f32 = 0.5;
/// Suspicion lost per second while searching
pub const SEARCH_SUSPICION_DECAY: f32 = 0.05;

// IDLE
/// Wait at each patrol waypoint (seconds)
pub const IDLE_PATROL_WAIT: f32 = 1.5;
/// Time spent working a resource node before returning home (seconds)
pub const RESOURCE_WORK_TIME: f32 = 4.0;
/// Time spent at home between resource trips (seconds)
pub const RESOURCE_REST_TIME: f32 = 2.0;

// ATTACK
/// Minimum attack distance
pub const ATTACK_RANGE_MIN: f32 = 1.0;
/// Maximum attack distance
pub const ATTACK_RANGE_MAX: f32 = 9.0;
/// Preferred stand-off distance
pub const OPTIMAL_DISTANCE: f32 = 5.0;
/// Cooldown of the default attack pattern (seconds)
pub const DEFAULT_ATTACK_COOLDOWN: f32 = 0.8;
/// Shots per burst
pub const BURST_SHOTS: u32 = 3;
/// Time between shots within a burst (seconds)
pub const BURST_INTERVAL: f32 = 0.12;
/// Cooldown after a burst (seconds)
pub const BURST_COOLDOWN: f32 = 1.6;
/// Laser charge time before a sniper shot (seconds)
pub const SNIPER_CHARGE_TIME: f32 = 1.2;
/// Cooldown after a sniper shot (seconds)
pub const SNIPER_COOLDOWN: f32 = 2.5;
/// Projectile speed assumed by the lead estimator
pub const PROJECTILE_SPEED: f32 = 14.0;
/// Blend factor of the lead estimator's velocity smoothing
pub const LEAD_SMOOTHING: f32 = 0.3;
