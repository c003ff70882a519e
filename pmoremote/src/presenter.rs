use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::model::{Entity, EntitySnapshot, ViewMode};
use crate::reconciler::SignalSet;
use crate::time_utils::ProgressView;

/// Receiver of every event the synchronization core produces.
///
/// Each method is called synchronously at the point the event occurs;
/// notifications are never batched across a tick.
pub trait Presenter: Send {
    /// A new player joined the roster at `position`.
    fn on_entity_discovered(&mut self, entity: &Entity, position: usize);

    /// `entity` became the active player.
    fn on_entity_activated(&mut self, entity: &Entity);

    /// Fresh state for `entity`; only the facets named in `signals` changed.
    fn on_entity_updated(&mut self, entity: &Entity, snapshot: &EntitySnapshot, signals: &SignalSet);

    /// A discovery batch finished and the active player was restored.
    fn on_all_ready(&mut self, roster: &[Entity]);

    /// A fetch failed. `entity` is `None` when the failure concerns a
    /// refresh of every player at once.
    fn on_fetch_failed(&mut self, _entity: Option<&Entity>, _error: &TransportError) {}

    fn on_view_changed(&mut self, _view: ViewMode) {}
}

/// Presenter writing every event to the log.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn on_entity_discovered(&mut self, entity: &Entity, position: usize) {
        info!(entity = entity.id.as_str(), name = %entity.name, position, "New player");
    }

    fn on_entity_activated(&mut self, entity: &Entity) {
        info!(entity = entity.id.as_str(), name = %entity.name, "Player activated");
    }

    fn on_entity_updated(&mut self, entity: &Entity, snapshot: &EntitySnapshot, signals: &SignalSet) {
        let progress = ProgressView::from_snapshot(snapshot);
        debug!(
            entity = entity.id.as_str(),
            signals = %signals,
            title = %snapshot.track.title,
            artist = %snapshot.track.artist,
            progress = %progress.title,
            volume = snapshot.volume,
            "Updated"
        );
    }

    fn on_all_ready(&mut self, roster: &[Entity]) {
        info!(players = roster.len(), "Server ready");
    }

    fn on_fetch_failed(&mut self, entity: Option<&Entity>, error: &TransportError) {
        match entity {
            Some(entity) => {
                warn!(entity = entity.id.as_str(), error = %error, "Cannot refresh player")
            }
            None => warn!(error = %error, "Cannot refresh players"),
        }
    }

    fn on_view_changed(&mut self, view: ViewMode) {
        debug!(view = ?view, "View changed");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Presenter keeping a readable trace of every call.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub events: Vec<String>,
    }

    impl Presenter for Recorder {
        fn on_entity_discovered(&mut self, entity: &Entity, position: usize) {
            self.events.push(format!("discovered {} @{}", entity.id, position));
        }

        fn on_entity_activated(&mut self, entity: &Entity) {
            self.events.push(format!("activated {}", entity.id));
        }

        fn on_entity_updated(&mut self, entity: &Entity, _snapshot: &EntitySnapshot, signals: &SignalSet) {
            self.events.push(format!("updated {} [{}]", entity.id, signals));
        }

        fn on_all_ready(&mut self, roster: &[Entity]) {
            self.events.push(format!("ready {}", roster.len()));
        }
    }
}
