//! Squad-coordinated drone AI for grid worlds.
//!
//! The host owns physics and the level; [`AiWorld`] owns the drones. Each
//! [`AiWorld::tick`] reads bodies through the [`Physics`] trait, runs the
//! drones' state machines, resolves path requests, and writes target
//! velocities and torques back. Fire intents, effects and squad lifecycle
//! come out as [`AiEvent`]s.

pub mod active_ai_tracker;
pub mod config;
pub mod constants;
pub mod debug;
pub mod drone;
pub mod error;
pub mod events;
pub mod geometry;
pub mod level;
pub mod logging;
pub mod movement;
pub mod pathfinding;
pub mod perception;
pub mod physics;
pub mod sandbox;
pub mod squad;
pub mod time_system;
pub mod world;

pub use config::{AiConfig, DroneParams, HelpResponse};
pub use drone::{AttackKind, IdleState, State, StateKind};
pub use error::{AiError, Result};
pub use events::AiEvent;
pub use level::LevelMap;
pub use physics::{BodyState, EntityId, Physics};
pub use world::AiWorld;
