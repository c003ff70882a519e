use std::collections::HashMap;

use tracing::debug;

use crate::EntityId;
use crate::errors::SyncError;
use crate::model::Entity;
use crate::presenter::Presenter;

/// Ordered collection of every player known to the session.
///
/// Positions are assigned at registration and never change: there is no
/// removal.
#[derive(Debug, Default)]
pub struct EntityRoster {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl EntityRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entity` and returns its 0-based position.
    ///
    /// The presenter is told about the new player so it can build whatever
    /// representation it needs.
    pub fn register(
        &mut self,
        entity: Entity,
        presenter: &mut dyn Presenter,
    ) -> Result<usize, SyncError> {
        if self.index.contains_key(&entity.id) {
            return Err(SyncError::DuplicateEntity(entity.id.0.clone()));
        }

        let position = self.entities.len();
        debug!(entity = entity.id.as_str(), position, "Registering player");
        self.index.insert(entity.id.clone(), position);
        self.entities.push(entity);
        presenter.on_entity_discovered(&self.entities[position], position);
        Ok(position)
    }

    pub fn all(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).map(|&position| &self.entities[position])
    }

    pub fn position_of(&self, id: &EntityId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn at(&self, position: usize) -> Option<&Entity> {
        self.entities.get(position)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::tests::Recorder;

    #[test]
    fn test_register_assigns_positions_in_order() {
        let mut roster = EntityRoster::new();
        let mut presenter = Recorder::default();

        assert_eq!(roster.register(Entity::new("a", "Kitchen"), &mut presenter).unwrap(), 0);
        assert_eq!(roster.register(Entity::new("b", "Office"), &mut presenter).unwrap(), 1);

        let ids: Vec<_> = roster.all().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(presenter.events, vec!["discovered a @0", "discovered b @1"]);
    }

    #[test]
    fn test_duplicate_is_rejected_without_notification() {
        let mut roster = EntityRoster::new();
        let mut presenter = Recorder::default();
        roster.register(Entity::new("a", "Kitchen"), &mut presenter).unwrap();

        let err = roster
            .register(Entity::new("a", "Kitchen again"), &mut presenter)
            .unwrap_err();
        assert!(matches!(err, SyncError::DuplicateEntity(id) if id == "a"));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.find(&EntityId::from("a")).unwrap().name, "Kitchen");
        assert_eq!(presenter.events.len(), 1);
    }

    #[test]
    fn test_lookup() {
        let mut roster = EntityRoster::new();
        let mut presenter = Recorder::default();
        roster.register(Entity::new("a", "Kitchen"), &mut presenter).unwrap();
        roster.register(Entity::new("b", "Office"), &mut presenter).unwrap();

        assert_eq!(roster.position_of(&EntityId::from("b")), Some(1));
        assert_eq!(roster.at(0).map(|e| e.name.as_str()), Some("Kitchen"));
        assert!(roster.at(2).is_none());
        assert!(roster.find(&EntityId::from("z")).is_none());
        assert!(!roster.is_empty());
    }
}
