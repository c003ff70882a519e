//! In-process players standing in for a real music server.

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use pmoremote::{
    EntityId, EntitySnapshot, MediaKind, PlaybackState, PlaylistRevision, PowerState,
    TrackMetadata, Transport, TransportError,
};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

const ALBUM: [(&str, u64); 4] = [
    ("Birdland", 357),
    ("A Remark You Made", 411),
    ("Teen Town", 171),
    ("Harlequin", 239),
];

#[derive(Debug)]
struct SimulatedPlayer {
    id: EntityId,
    name: String,
    power: PowerState,
    live: bool,
    /// Play order, as indexes into `ALBUM`.
    queue: Vec<usize>,
    track: usize,
    position: u64,
    volume: u8,
    revision: u64,
    last_update: Instant,
}

impl SimulatedPlayer {
    fn new(id: &str, name: &str, live: bool) -> Self {
        Self {
            id: EntityId::from(id),
            name: name.to_string(),
            power: PowerState::On(PlaybackState::Playing),
            live,
            queue: (0..ALBUM.len()).collect(),
            track: 0,
            position: 0,
            volume: 30,
            revision: 1,
            last_update: Instant::now(),
        }
    }

    fn duration(&self) -> u64 {
        if self.live {
            0
        } else {
            ALBUM[self.queue[self.track]].1
        }
    }

    /// Moves the playhead by the wall time elapsed since the last call.
    fn advance(&mut self) {
        let elapsed = self.last_update.elapsed().as_secs();
        if elapsed == 0 {
            return;
        }
        self.last_update += std::time::Duration::from_secs(elapsed);
        if self.power != PowerState::On(PlaybackState::Playing) {
            return;
        }
        self.position += elapsed;
        if !self.live && self.position >= self.duration() {
            self.skip(1);
        }
    }

    /// Moves through the queue. Running off either end reshuffles the
    /// queue, which is a playlist change.
    fn skip(&mut self, forward: isize) {
        let len = self.queue.len() as isize;
        let target = self.track as isize + forward;
        if !(0..len).contains(&target) {
            self.queue.shuffle(&mut rand::rng());
            self.revision += 1;
        }
        self.track = target.rem_euclid(len) as usize;
        self.position = 0;
    }

    fn snapshot(&self) -> EntitySnapshot {
        let track = if self.live {
            TrackMetadata {
                title: "Radio Paradise".to_string(),
                artist: "Main Mix".to_string(),
                ..Default::default()
            }
        } else {
            album_track(self.queue[self.track])
        };
        EntitySnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            power: self.power,
            media_kind: if self.live {
                MediaKind::Stream
            } else {
                MediaKind::File
            },
            track,
            position: self.position,
            duration: self.duration(),
            volume: self.volume,
            playlist_revision: PlaylistRevision(self.revision.to_string()),
            playlist: self.queue.iter().map(|&i| album_track(i)).collect(),
        }
    }
}

fn album_track(index: usize) -> TrackMetadata {
    TrackMetadata {
        title: ALBUM[index].0.to_string(),
        artist: "Weather Report".to_string(),
        album: "Heavy Weather".to_string(),
        artwork_url: None,
    }
}

/// A handful of players with a flaky network.
#[derive(Debug)]
pub struct SimulatedTransport {
    players: Mutex<Vec<SimulatedPlayer>>,
    failure_rate: f64,
}

impl SimulatedTransport {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            players: Mutex::new(vec![
                SimulatedPlayer::new("00:04:20:aa:01:01", "Living room", false),
                SimulatedPlayer::new("00:04:20:aa:01:02", "Kitchen", true),
                SimulatedPlayer::new("00:04:20:aa:01:03", "Bedroom", false),
            ]),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    fn flaky(&self) -> Result<(), TransportError> {
        if rand::rng().random_bool(self.failure_rate) {
            Err(TransportError::Network("simulated timeout".to_string()))
        } else {
            Ok(())
        }
    }

    fn with_player<T>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&mut SimulatedPlayer) -> T,
    ) -> Result<T, TransportError> {
        let mut players = self
            .players
            .lock()
            .map_err(|_| TransportError::Unavailable(id.to_string()))?;
        let player = players
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| TransportError::Unavailable(id.to_string()))?;
        player.advance();
        Ok(f(player))
    }

    fn command(
        &self,
        id: &EntityId,
        name: &str,
        f: impl FnOnce(&mut SimulatedPlayer),
    ) -> Result<(), TransportError> {
        debug!(entity = id.as_str(), command = name, "Simulated command");
        self.with_player(id, f)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn fetch_state(&self, id: &EntityId) -> Result<EntitySnapshot, TransportError> {
        self.flaky()?;
        self.with_player(id, |p| p.snapshot())
    }

    async fn fetch_all_states(&self) -> Result<Vec<EntitySnapshot>, TransportError> {
        self.flaky()?;
        let mut players = self
            .players
            .lock()
            .map_err(|_| TransportError::Network("player table unavailable".to_string()))?;
        Ok(players
            .iter_mut()
            .map(|p| {
                p.advance();
                p.snapshot()
            })
            .collect())
    }

    async fn play(&self, id: &EntityId) -> Result<(), TransportError> {
        self.command(id, "play", |p| p.power = PowerState::On(PlaybackState::Playing))
    }

    async fn pause(&self, id: &EntityId) -> Result<(), TransportError> {
        self.command(id, "pause", |p| p.power = PowerState::On(PlaybackState::Paused))
    }

    async fn stop(&self, id: &EntityId) -> Result<(), TransportError> {
        self.command(id, "stop", |p| {
            p.power = PowerState::On(PlaybackState::Stopped);
            p.position = 0;
        })
    }

    async fn next(&self, id: &EntityId) -> Result<(), TransportError> {
        self.command(id, "next", |p| p.skip(1))
    }

    async fn previous(&self, id: &EntityId) -> Result<(), TransportError> {
        self.command(id, "previous", |p| p.skip(-1))
    }

    async fn set_volume(&self, id: &EntityId, volume: u8) -> Result<(), TransportError> {
        self.command(id, "set_volume", |p| p.volume = volume.min(100))
    }

    async fn set_position(&self, id: &EntityId, seconds: u64) -> Result<(), TransportError> {
        let rejected = self.with_player(id, |p| p.live)?;
        if rejected {
            return Err(TransportError::Rejected(
                "set_position".to_string(),
                "live stream".to_string(),
            ));
        }
        self.command(id, "set_position", |p| p.position = seconds.min(p.duration()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reliable_simulator_lists_players() {
        let transport = SimulatedTransport::new(0.0);
        let players = transport.fetch_all_states().await.unwrap();
        assert_eq!(players.len(), 3);
        assert!(players[1].is_live());
    }

    #[tokio::test]
    async fn test_commands_change_state() {
        let transport = SimulatedTransport::new(0.0);
        let id = EntityId::from("00:04:20:aa:01:01");
        transport.set_volume(&id, 120).await.unwrap();
        transport.next(&id).await.unwrap();

        let state = transport.fetch_state(&id).await.unwrap();
        assert_eq!(state.volume, 100);
        assert_eq!(state.track.title, "A Remark You Made");

        let radio = EntityId::from("00:04:20:aa:01:02");
        assert!(matches!(
            transport.set_position(&radio, 10).await,
            Err(TransportError::Rejected(..))
        ));
    }

    #[tokio::test]
    async fn test_wrapping_around_changes_playlist_revision() {
        let transport = SimulatedTransport::new(0.0);
        let id = EntityId::from("00:04:20:aa:01:03");
        let before = transport.fetch_state(&id).await.unwrap();

        transport.next(&id).await.unwrap();
        let middle = transport.fetch_state(&id).await.unwrap();
        assert_eq!(middle.playlist_revision, before.playlist_revision);

        transport.previous(&id).await.unwrap();
        transport.previous(&id).await.unwrap();
        let after = transport.fetch_state(&id).await.unwrap();
        assert_ne!(after.playlist_revision, before.playlist_revision);
        assert_eq!(after.playlist.len(), ALBUM.len());
    }

    #[tokio::test]
    async fn test_failing_simulator() {
        let transport = SimulatedTransport::new(1.0);
        assert!(transport.fetch_all_states().await.is_err());
    }
}
