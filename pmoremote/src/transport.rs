use async_trait::async_trait;

use crate::EntityId;
use crate::errors::TransportError;
use crate::model::EntitySnapshot;

/// Access to the remote players.
///
/// The synchronization core only reads state through the two fetch
/// operations; commands are fire-and-forget from its point of view.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_state(&self, id: &EntityId) -> Result<EntitySnapshot, TransportError>;

    async fn fetch_all_states(&self) -> Result<Vec<EntitySnapshot>, TransportError>;

    async fn play(&self, id: &EntityId) -> Result<(), TransportError>;
    async fn pause(&self, id: &EntityId) -> Result<(), TransportError>;
    async fn stop(&self, id: &EntityId) -> Result<(), TransportError>;
    async fn next(&self, id: &EntityId) -> Result<(), TransportError>;
    async fn previous(&self, id: &EntityId) -> Result<(), TransportError>;
    async fn set_volume(&self, id: &EntityId, volume: u8) -> Result<(), TransportError>;
    async fn set_position(&self, id: &EntityId, seconds: u64) -> Result<(), TransportError>;
}

/// A player command, as triggered by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SetVolume(u8),
    SetPosition(u64),
}

impl PlayerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::Stop => "stop",
            PlayerCommand::Next => "next",
            PlayerCommand::Previous => "previous",
            PlayerCommand::SetVolume(_) => "set_volume",
            PlayerCommand::SetPosition(_) => "set_position",
        }
    }

    /// Routes the command to the matching transport operation.
    pub async fn dispatch(
        self,
        transport: &dyn Transport,
        id: &EntityId,
    ) -> Result<(), TransportError> {
        match self {
            PlayerCommand::Play => transport.play(id).await,
            PlayerCommand::Pause => transport.pause(id).await,
            PlayerCommand::Stop => transport.stop(id).await,
            PlayerCommand::Next => transport.next(id).await,
            PlayerCommand::Previous => transport.previous(id).await,
            PlayerCommand::SetVolume(volume) => transport.set_volume(id, volume.min(100)).await,
            PlayerCommand::SetPosition(seconds) => transport.set_position(id, seconds).await,
        }
    }
}
