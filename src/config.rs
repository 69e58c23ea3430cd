//! Runtime configuration.
//!
//! World-wide settings live in [`AiConfig`], per-drone tuning in
//! [`DroneParams`]. Both deserialize from JSON with every field optional;
//! missing fields fall back to the values in `constants`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::drone::AttackKind;
use crate::error::{AiError, Result};
use crate::pathfinding::PathOptions;

/// How eagerly a drone answers help-calls
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpResponse {
    /// Never leaves its post
    Ignore,
    #[default]
    Normal,
    /// Preferred over normal responders
    Eager,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub memory_time: f32,
    pub damage_memory_time: f32,
    pub relock_distance: f32,
    pub lock_timeout: f32,
    pub threat_radius: f32,
    pub hearing_fast_speed: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            memory_time: MEMORY_TIME,
            damage_memory_time: DAMAGE_MEMORY_TIME,
            relock_distance: SENSOR_RELOCK_DISTANCE,
            lock_timeout: SENSOR_LOCK_TIMEOUT,
            threat_radius: THREAT_RADIUS,
            hearing_fast_speed: HEARING_FAST_SPEED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadConfig {
    pub aos_sectors: usize,
    pub aos_wall_margin: f32,
    pub consensus_time: f32,
    pub recent_sighting: f32,
    pub help_radius: f32,
    pub search_rings: usize,
    pub search_ring_step: f32,
    pub search_point_spacing: f32,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            aos_sectors: AOS_SECTORS,
            aos_wall_margin: AOS_WALL_MARGIN,
            consensus_time: SEARCH_CONSENSUS_TIME,
            recent_sighting: SQUAD_RECENT_SIGHTING,
            help_radius: HELP_CALL_RADIUS,
            search_rings: SEARCH_RINGS,
            search_ring_step: SEARCH_RING_STEP,
            search_point_spacing: SEARCH_POINT_SPACING,
        }
    }
}

/// World-level AI settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Seed of the world's random stream
    pub seed: u64,
    pub path: PathOptions,
    /// Path searches per tick
    pub path_budget: usize,
    /// Search limit in cells for movement requests
    pub max_path_length: u32,
    pub evade_cost: u32,
    pub perception: PerceptionConfig,
    pub squad: SquadConfig,
    /// Drones further than this from the focus go dormant
    pub active_radius: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            path: PathOptions::default(),
            path_budget: PATH_SEARCHES_PER_TICK,
            max_path_length: PATH_DEFAULT_MAX_LENGTH,
            evade_cost: PATH_DEFAULT_EVADE_COST,
            perception: PerceptionConfig::default(),
            squad: SquadConfig::default(),
            active_radius: AI_ACTIVE_RADIUS,
        }
    }
}

impl AiConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the world can't be built with.
    pub fn validate(&self) -> Result<()> {
        if self.squad.aos_sectors < AOS_MIN_SECTORS {
            return Err(AiError::InvalidConfig(format!(
                "squad.aos_sectors is {}, needs at least {}",
                self.squad.aos_sectors, AOS_MIN_SECTORS
            )));
        }
        Ok(())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Per-drone tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneParams {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub precise_speed: f32,
    /// Radians per second
    pub rotation_speed: f32,
    pub detect_radius: f32,
    pub optimal_detect_radius: f32,
    pub fov_min: f32,
    pub fov_max: f32,
    pub hearing_radius: f32,
    pub hearing_fast_radius: f32,
    /// Pick targets from sensor contacts instead of watching the hunted entity
    pub sensor: bool,
    /// Whether the drone can move at all (turrets can't)
    pub mobile: bool,
    /// Campers hold position: no chasing, no searching
    pub camper: bool,
    pub help_response: HelpResponse,
    pub attack: AttackKind,
    pub attack_range_min: f32,
    pub attack_range_max: f32,
    pub optimal_distance: f32,
    /// Hidden time before chasing starts
    pub chase_wait: f32,
    /// Area-of-sight sectors reserved on each side of this drone's slot
    pub free_radius: usize,
    /// Area-of-sight placement priority (higher picks first)
    pub placement_priority: f32,
}

impl Default for DroneParams {
    fn default() -> Self {
        Self {
            walk_speed: WALK_SPEED,
            run_speed: RUN_SPEED,
            precise_speed: PRECISE_SPEED,
            rotation_speed: ROTATION_SPEED,
            detect_radius: DETECT_RADIUS,
            optimal_detect_radius: OPTIMAL_DETECT_RADIUS,
            fov_min: FOV_MIN_HALF_ANGLE,
            fov_max: FOV_MAX_HALF_ANGLE,
            hearing_radius: HEARING_RADIUS,
            hearing_fast_radius: HEARING_FAST_RADIUS,
            sensor: false,
            mobile: true,
            camper: false,
            help_response: HelpResponse::Normal,
            attack: AttackKind::Default,
            attack_range_min: ATTACK_RANGE_MIN,
            attack_range_max: ATTACK_RANGE_MAX,
            optimal_distance: OPTIMAL_DISTANCE,
            chase_wait: BATTLE_CHASE_WAIT,
            free_radius: 0,
            placement_priority: 1.0,
        }
    }
}

impl DroneParams {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// A stationary drone that never leaves its spot.
    pub fn turret() -> Self {
        Self {
            mobile: false,
            camper: true,
            help_response: HelpResponse::Ignore,
            ..Self::default()
        }
    }

    #[inline]
    pub fn in_attack_band(&self, distance: f32) -> bool {
        distance >= self.attack_range_min && distance <= self.attack_range_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AiConfig::from_json_str(r#"{ "seed": 9, "squad": { "help_radius": 5.0 } }"#);
        let Ok(config) = config else {
            panic!("config should parse");
        };
        assert_eq!(config.seed, 9);
        assert_eq!(config.squad.help_radius, 5.0);
        assert_eq!(config.squad.aos_sectors, AOS_SECTORS);
        assert_eq!(config.path_budget, PATH_SEARCHES_PER_TICK);
    }

    #[test]
    fn test_drone_params_json() {
        let params = DroneParams::from_json_str(
            r#"{ "camper": true, "attack": "burst", "help_response": "eager" }"#,
        );
        let Ok(params) = params else {
            panic!("params should parse");
        };
        assert!(params.camper);
        assert_eq!(params.attack, AttackKind::Burst);
        assert_eq!(params.help_response, HelpResponse::Eager);
        assert_eq!(params.walk_speed, WALK_SPEED);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let result = AiConfig::from_json_str("{ seed: }");
        assert!(matches!(result, Err(AiError::Config(_))));
    }

    #[test]
    fn test_too_few_sectors_is_rejected() {
        let result = AiConfig::from_json_str(r#"{ "squad": { "aos_sectors": 3 } }"#);
        assert!(matches!(result, Err(AiError::InvalidConfig(_))));
        assert!(AiConfig::from_json_str(r#"{ "squad": { "aos_sectors": 4 } }"#).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AiConfig::from_path("/nonexistent/ai.json");
        assert!(matches!(result, Err(AiError::Io(_))));
    }
}
