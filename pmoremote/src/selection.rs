//! Durable storage of the last active player.
//!
//! The storage medium is abstracted behind [`KeyValueStore`] so the same
//! [`PersistentSelection`] works on top of the configuration file, or of a
//! plain in-memory map in tests.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::EntityId;
use crate::errors::SyncError;

/// Key under which the active player identifier is stored.
pub const ACTIVE_PLAYER_KEY: &str = "active_player";

/// Minimal synchronous key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Volatile store, lost when the process exits.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut store = Self::new();
        store.values.insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Values live in the `state` section of `config.yaml`.
impl KeyValueStore for pmoconfig::Config {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_state(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_state(key, value)
    }
}

impl KeyValueStore for Arc<pmoconfig::Config> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_state(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_state(key, value)
    }
}

/// Typed access to the single persisted value: the active player id.
#[derive(Debug)]
pub struct PersistentSelection<K: KeyValueStore> {
    backend: K,
}

impl<K: KeyValueStore> PersistentSelection<K> {
    pub fn new(backend: K) -> Self {
        Self { backend }
    }

    /// Last persisted active player.
    ///
    /// An unreadable store is treated like an empty one.
    pub fn load(&self) -> Option<EntityId> {
        match self.backend.get(ACTIVE_PLAYER_KEY) {
            Ok(Some(value)) if !value.is_empty() => Some(EntityId(value)),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "Cannot read persisted active player");
                None
            }
        }
    }

    pub fn store(&mut self, id: &EntityId) -> Result<(), SyncError> {
        debug!(entity = id.as_str(), "Persisting active player");
        self.backend
            .set(ACTIVE_PLAYER_KEY, id.as_str())
            .map_err(|err| SyncError::Persistence(err.to_string()))
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut K {
        &mut self.backend
    }
}
