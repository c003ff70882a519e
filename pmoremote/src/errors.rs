use thiserror::Error;

use crate::EntityId;

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Player {0} is unavailable")]
    Unavailable(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Command '{0}' rejected: {1}")]
    Rejected(String, String),
    #[error("Cannot decode player state: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0} does not reference a known player")]
    InvalidReference(String),
    #[error("Player {0} is already registered")]
    DuplicateEntity(String),
    #[error("Cannot persist active player: {0}")]
    Persistence(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Synchronization engine is not running")]
    EngineStopped,
}

impl SyncError {
    pub fn invalid_reference(id: &EntityId) -> Self {
        SyncError::InvalidReference(id.0.clone())
    }

    pub fn invalid_position(position: usize) -> Self {
        SyncError::InvalidReference(format!("position {}", position))
    }
}
