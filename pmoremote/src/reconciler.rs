//! Change detection between fetched player states and what the presentation
//! layer last displayed.
//!
//! [`diff`] is a pure function over two snapshots. [`StateReconciler`] keeps
//! the last rendered snapshot of each player and feeds it to [`diff`].
//!
//! Playlists are never compared by content: the revision token carried by
//! every snapshot is the only change marker, since playlists can be large and
//! tokens are cheap.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::EntityId;
use crate::model::EntitySnapshot;

/// One facet of a player's presented state that must be refreshed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateSignal {
    /// Name and id labels.
    Identity,
    /// on/off, playing/paused/stopped, stream/file.
    PlaybackState,
    /// Title, artist, album and artwork of the current track.
    Track,
    /// Position and duration. Always part of a reconciliation result.
    Progress,
    Volume,
    Playlist,
}

impl UpdateSignal {
    pub const ALL: [UpdateSignal; 6] = [
        UpdateSignal::Identity,
        UpdateSignal::PlaybackState,
        UpdateSignal::Track,
        UpdateSignal::Progress,
        UpdateSignal::Volume,
        UpdateSignal::Playlist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateSignal::Identity => "identity",
            UpdateSignal::PlaybackState => "playback_state",
            UpdateSignal::Track => "track",
            UpdateSignal::Progress => "progress",
            UpdateSignal::Volume => "volume",
            UpdateSignal::Playlist => "playlist",
        }
    }
}

/// Ordered set of [`UpdateSignal`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalSet(BTreeSet<UpdateSignal>);

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        UpdateSignal::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, signal: UpdateSignal) -> bool {
        self.0.insert(signal)
    }

    pub fn contains(&self, signal: UpdateSignal) -> bool {
        self.0.contains(&signal)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = UpdateSignal> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<UpdateSignal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = UpdateSignal>>(iter: I) -> Self {
        SignalSet(iter.into_iter().collect())
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

/// Signals needed to go from `previous` (what is displayed) to `incoming`.
///
/// Without a previous snapshot everything has to be drawn.
pub fn diff(previous: Option<&EntitySnapshot>, incoming: &EntitySnapshot) -> SignalSet {
    let Some(previous) = previous else {
        return SignalSet::all();
    };

    let mut signals = SignalSet::new();
    signals.insert(UpdateSignal::Progress);

    if previous.id != incoming.id || previous.name != incoming.name {
        signals.insert(UpdateSignal::Identity);
    }
    if previous.power != incoming.power || previous.media_kind != incoming.media_kind {
        signals.insert(UpdateSignal::PlaybackState);
    }
    if previous.track != incoming.track {
        signals.insert(UpdateSignal::Track);
    }
    if previous.volume != incoming.volume {
        signals.insert(UpdateSignal::Volume);
    }
    if previous.playlist_revision != incoming.playlist_revision {
        signals.insert(UpdateSignal::Playlist);
    }

    signals
}

/// Last rendered snapshot of every player, used only for diffing.
#[derive(Debug, Default)]
pub struct StateReconciler {
    rendered: HashMap<EntityId, EntitySnapshot>,
}

impl StateReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `incoming` against the rendered snapshot of the same player and
    /// records `incoming` as rendered.
    pub fn reconcile(&mut self, incoming: EntitySnapshot) -> SignalSet {
        let signals = diff(self.rendered.get(&incoming.id), &incoming);
        self.rendered.insert(incoming.id.clone(), incoming);
        signals
    }

    pub fn rendered(&self, id: &EntityId) -> Option<&EntitySnapshot> {
        self.rendered.get(id)
    }
}
