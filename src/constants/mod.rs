//! Tuning constants organized by domain.
//!
//! Centralizing magic numbers makes tuning easier and documents intent.
//! These are the defaults behind `AiConfig` and `DroneParams`.

mod drone;
mod movement;
mod pathfinding;
mod perception;
mod squad;
mod time;

pub use drone::*;
pub use movement::*;
pub use pathfinding::*;
pub use perception::*;
pub use squad::*;
pub use time::*;
