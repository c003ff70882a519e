//! Ownership of the "exactly one active player" invariant.

use tracing::{debug, info, warn};

use crate::EntityId;
use crate::errors::SyncError;
use crate::model::Entity;
use crate::roster::EntityRoster;
use crate::selection::{KeyValueStore, PersistentSelection};

/// Result of an activation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The requested player was already active; nothing was done.
    Unchanged,
    /// `entity` is now active and has been persisted.
    Switched {
        previous: Option<EntityId>,
        entity: Entity,
    },
}

/// Holds the single authoritative active player.
///
/// Once a restore has completed on a non-empty roster exactly one player is
/// active; with an empty roster nobody is and the restore waits for the next
/// discovery batch.
#[derive(Debug)]
pub struct ActivationController<K: KeyValueStore> {
    active: Option<EntityId>,
    restore_pending: bool,
    selection: PersistentSelection<K>,
}

impl<K: KeyValueStore> ActivationController<K> {
    pub fn new(selection: PersistentSelection<K>) -> Self {
        Self {
            active: None,
            restore_pending: false,
            selection,
        }
    }

    pub fn active(&self) -> Option<&EntityId> {
        self.active.as_ref()
    }

    pub fn is_active(&self, id: &EntityId) -> bool {
        self.active.as_ref() == Some(id)
    }

    pub fn is_restore_pending(&self) -> bool {
        self.restore_pending
    }

    pub fn selection(&self) -> &PersistentSelection<K> {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut PersistentSelection<K> {
        &mut self.selection
    }

    /// Makes `id` the active player and persists it.
    ///
    /// Unknown ids are rejected without touching any state.
    pub fn activate(
        &mut self,
        roster: &EntityRoster,
        id: &EntityId,
    ) -> Result<ActivationOutcome, SyncError> {
        let entity = roster
            .find(id)
            .ok_or_else(|| SyncError::invalid_reference(id))?
            .clone();

        if self.is_active(id) {
            debug!(entity = id.as_str(), "Player already active");
            return Ok(ActivationOutcome::Unchanged);
        }

        let previous = self.active.replace(entity.id.clone());
        info!(
            entity = entity.id.as_str(),
            previous = previous.as_ref().map(|p| p.as_str()),
            "Activating player"
        );

        if let Err(err) = self.selection.store(&entity.id) {
            warn!(entity = entity.id.as_str(), error = %err, "Active player not persisted");
        }

        Ok(ActivationOutcome::Switched { previous, entity })
    }

    /// Carousel navigation: activates the player shown at `position`.
    pub fn activate_position(
        &mut self,
        roster: &EntityRoster,
        position: usize,
    ) -> Result<ActivationOutcome, SyncError> {
        let id = roster
            .at(position)
            .map(|entity| entity.id.clone())
            .ok_or_else(|| SyncError::invalid_position(position))?;
        self.activate(roster, &id)
    }

    /// Reactivates the persisted player, or the first one when the persisted
    /// id is missing or no longer known.
    ///
    /// Returns `None` when the roster is still empty: the restore is then
    /// deferred to [`complete_deferred_restore`](Self::complete_deferred_restore).
    pub fn restore_on_startup(
        &mut self,
        roster: &EntityRoster,
    ) -> Result<Option<ActivationOutcome>, SyncError> {
        if roster.is_empty() {
            debug!("No player yet, deferring restore");
            self.restore_pending = true;
            return Ok(None);
        }
        self.restore_pending = false;

        let target = match self.selection.load() {
            Some(id) if roster.contains(&id) => id,
            Some(id) => {
                debug!(entity = id.as_str(), "Persisted player is gone, using the first one");
                roster.all()[0].id.clone()
            }
            None => roster.all()[0].id.clone(),
        };

        self.activate(roster, &target).map(Some)
    }

    /// Finishes a restore deferred by an empty roster, once a discovery batch
    /// has completed.
    pub fn complete_deferred_restore(
        &mut self,
        roster: &EntityRoster,
    ) -> Result<Option<ActivationOutcome>, SyncError> {
        if !self.restore_pending {
            return Ok(None);
        }
        self.restore_on_startup(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::tests::Recorder;
    use crate::selection::{ACTIVE_PLAYER_KEY, MemoryStore};

    /// Counts writes to observe persistence side effects.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: usize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            self.writes += 1;
            self.inner.set(key, value)
        }
    }

    fn roster(ids: &[&str]) -> EntityRoster {
        let mut roster = EntityRoster::new();
        let mut presenter = Recorder::default();
        for id in ids {
            roster
                .register(Entity::new(*id, id.to_uppercase()), &mut presenter)
                .unwrap();
        }
        roster
    }

    fn controller(persisted: Option<&str>) -> ActivationController<CountingStore> {
        let inner = match persisted {
            Some(id) => MemoryStore::with_value(ACTIVE_PLAYER_KEY, id),
            None => MemoryStore::new(),
        };
        ActivationController::new(PersistentSelection::new(CountingStore { inner, writes: 0 }))
    }

    #[test]
    fn test_activate_twice_writes_once() {
        let roster = roster(&["a", "b"]);
        let mut ctrl = controller(None);
        let id = EntityId::from("b");

        let first = ctrl.activate(&roster, &id).unwrap();
        assert!(matches!(first, ActivationOutcome::Switched { previous: None, .. }));
        assert_eq!(ctrl.activate(&roster, &id).unwrap(), ActivationOutcome::Unchanged);

        assert_eq!(ctrl.selection().backend().writes, 1);
        assert!(ctrl.is_active(&id));
    }

    #[test]
    fn test_switch_reports_previous() {
        let roster = roster(&["a", "b"]);
        let mut ctrl = controller(None);
        ctrl.activate(&roster, &EntityId::from("a")).unwrap();

        match ctrl.activate(&roster, &EntityId::from("b")).unwrap() {
            ActivationOutcome::Switched { previous, entity } => {
                assert_eq!(previous, Some(EntityId::from("a")));
                assert_eq!(entity.id, EntityId::from("b"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(ctrl.selection().load(), Some(EntityId::from("b")));
    }

    #[test]
    fn test_unknown_id_changes_nothing() {
        let roster = roster(&["a"]);
        let mut ctrl = controller(None);
        ctrl.activate(&roster, &EntityId::from("a")).unwrap();

        let err = ctrl.activate(&roster, &EntityId::from("ghost")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidReference(_)));
        assert!(ctrl.is_active(&EntityId::from("a")));
        assert_eq!(ctrl.selection().backend().writes, 1);
    }

    #[test]
    fn test_restore_uses_persisted_player() {
        let roster = roster(&["a", "b", "c"]);
        let mut ctrl = controller(Some("c"));

        ctrl.restore_on_startup(&roster).unwrap();
        assert_eq!(ctrl.active(), Some(&EntityId::from("c")));
    }

    #[test]
    fn test_restore_falls_back_to_first_player() {
        let roster = roster(&["A", "B"]);
        let mut ctrl = controller(Some("Z"));

        ctrl.restore_on_startup(&roster).unwrap();
        assert_eq!(ctrl.active(), Some(&EntityId::from("A")));
    }

    #[test]
    fn test_restore_without_persisted_value() {
        let roster = roster(&["a", "b"]);
        let mut ctrl = controller(None);

        ctrl.restore_on_startup(&roster).unwrap();
        assert_eq!(ctrl.active(), Some(&EntityId::from("a")));
    }

    #[test]
    fn test_restore_deferred_on_empty_roster() {
        let empty = EntityRoster::new();
        let mut ctrl = controller(Some("b"));

        assert_eq!(ctrl.restore_on_startup(&empty).unwrap(), None);
        assert!(ctrl.is_restore_pending());
        assert_eq!(ctrl.active(), None);

        let roster = roster(&["a", "b"]);
        let outcome = ctrl.complete_deferred_restore(&roster).unwrap();
        assert!(matches!(outcome, Some(ActivationOutcome::Switched { .. })));
        assert!(!ctrl.is_restore_pending());
        assert_eq!(ctrl.active(), Some(&EntityId::from("b")));

        // nothing left to restore
        assert_eq!(ctrl.complete_deferred_restore(&roster).unwrap(), None);
    }

    #[test]
    fn test_activate_position() {
        let roster = roster(&["a", "b"]);
        let mut ctrl = controller(None);

        ctrl.activate_position(&roster, 1).unwrap();
        assert_eq!(ctrl.active(), Some(&EntityId::from("b")));
        assert!(ctrl.activate_position(&roster, 5).is_err());
        assert_eq!(ctrl.active(), Some(&EntityId::from("b")));
    }
}
