//! Errors surfaced by the AI world API.

use thiserror::Error;

use crate::physics::EntityId;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("entity {0:?} is not a registered drone")]
    UnknownAgent(EntityId),

    #[error("entity {0:?} is already a registered drone")]
    AlreadyRegistered(EntityId),

    #[error("drone {0:?} has no movement and cannot be driven")]
    NoMovement(EntityId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AiError>;
