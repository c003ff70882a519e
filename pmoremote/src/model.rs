//! Data model shared by every part of the synchronization core.

use serde::{Deserialize, Deserializer, Serialize};

use crate::EntityId;

/// A remote player as known by the roster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id.into()),
            name: name.into(),
        }
    }
}

/// Transport state of a powered-on player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        }
    }
}

/// A player is either off, or on with exactly one playback state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Off,
    On(PlaybackState),
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On(_))
    }

    pub fn playback(&self) -> Option<PlaybackState> {
        match self {
            PowerState::On(state) => Some(*state),
            PowerState::Off => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Stream,
    File,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork_url: Option<String>,
}

/// Opaque token that changes whenever a player's playlist is mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistRevision(pub String);

/// Full state of one player as fetched from the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub name: String,
    pub power: PowerState,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub track: TrackMetadata,
    /// Seconds into the current track.
    #[serde(default, deserialize_with = "whole_seconds")]
    pub position: u64,
    /// Track length in seconds, 0 when unknown (live streams).
    #[serde(default, deserialize_with = "whole_seconds")]
    pub duration: u64,
    #[serde(default, deserialize_with = "volume_percent")]
    pub volume: u8,
    #[serde(default)]
    pub playlist_revision: PlaylistRevision,
    #[serde(default)]
    pub playlist: Vec<TrackMetadata>,
}

impl EntitySnapshot {
    /// Roster view of this snapshot.
    pub fn entity(&self) -> Entity {
        Entity {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.duration == 0
    }

    /// Enforces the value ranges transports are not trusted to respect:
    /// volume at most 100, position at most duration when the duration is known.
    pub fn normalized(mut self) -> Self {
        self.volume = self.volume.min(100);
        if self.duration > 0 && self.position > self.duration {
            self.position = self.duration;
        }
        self
    }
}

/// Which part of the UI is visible, drives the polling plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    /// Detailed view of the active player.
    #[default]
    Entity,
    /// The "all volumes" view listing every player.
    Aggregate,
}

fn whole_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_finite() && raw > 0.0 {
        Ok(raw.floor() as u64)
    } else {
        Ok(0)
    }
}

fn volume_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_finite() && raw > 0.0 {
        Ok(raw.min(100.0).floor() as u8)
    } else {
        Ok(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn snapshot(id: &str) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId(id.to_string()),
            name: format!("Player {}", id),
            power: PowerState::On(PlaybackState::Playing),
            media_kind: MediaKind::File,
            track: TrackMetadata {
                title: "So What".to_string(),
                artist: "Miles Davis".to_string(),
                album: "Kind of Blue".to_string(),
                artwork_url: None,
            },
            position: 30,
            duration: 545,
            volume: 40,
            playlist_revision: PlaylistRevision("1".to_string()),
            playlist: Vec::new(),
        }
    }

    #[test]
    fn test_normalized_clamps_position_and_volume() {
        let mut snap = snapshot("a");
        snap.position = 600;
        snap.volume = 250;
        let snap = snap.normalized();
        assert_eq!(snap.position, 545);
        assert_eq!(snap.volume, 100);
    }

    #[test]
    fn test_normalized_keeps_live_position() {
        let mut snap = snapshot("a");
        snap.duration = 0;
        snap.position = 4000;
        assert_eq!(snap.normalized().position, 4000);
    }

    #[test]
    fn test_deserialize_floors_fractional_seconds() {
        let json = r#"{
            "id": "kitchen",
            "name": "Kitchen",
            "power": {"on": "paused"},
            "media_kind": "stream",
            "position": 12.9,
            "duration": 0,
            "volume": 33.7,
            "playlist_revision": "1699999999"
        }"#;
        let snap: EntitySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.position, 12);
        assert_eq!(snap.volume, 33);
        assert_eq!(snap.power, PowerState::On(PlaybackState::Paused));
        assert!(snap.is_live());
        assert!(snap.playlist.is_empty());
    }

    #[test]
    fn test_power_off_deserializes() {
        let power: PowerState = serde_json::from_str(r#""off""#).unwrap();
        assert_eq!(power, PowerState::Off);
        assert!(power.playback().is_none());
    }
}
