//! # pmoremote
//!
//! Polling-driven state synchronization for a set of remote music players.
//!
//! The crate decides what to fetch and how often, which player is active, how
//! a freshly fetched state differs from what the user interface last showed,
//! and which minimal set of update signals to hand to the presentation layer.
//! Talking to the players ([`Transport`]) and drawing the interface
//! ([`Presenter`]) are left to the caller.
//!
//! ```rust,ignore
//! let transport: Arc<dyn Transport> = Arc::new(MyTransport::new());
//! let store = PersistentSelection::new(config);
//! let mut engine = SyncEngine::new(transport, store, MyPresenter, SyncConfig::default());
//! engine.bootstrap().await?;
//!
//! let (handle, requests) = SyncHandle::channel();
//! tokio::spawn(engine.run(requests));
//! handle.show_aggregate_view().await;
//! ```

pub mod activation;
pub mod config;
pub mod controls;
pub mod engine;
pub mod errors;
pub mod model;
pub mod presenter;
pub mod reconciler;
pub mod roster;
pub mod scheduler;
pub mod selection;
pub mod time_utils;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use activation::{ActivationController, ActivationOutcome};
pub use config::SyncConfig;
pub use engine::{EngineRequest, FetchCompletion, SyncEngine, SyncHandle};
pub use errors::{SyncError, TransportError};
pub use model::{
    Entity, EntitySnapshot, MediaKind, PlaybackState, PlaylistRevision, PowerState,
    TrackMetadata, ViewMode,
};
pub use presenter::{LogPresenter, Presenter};
pub use reconciler::{SignalSet, StateReconciler, UpdateSignal};
pub use roster::EntityRoster;
pub use scheduler::{FreshnessGuard, PollingScheduler, TickPlan};
pub use selection::{KeyValueStore, MemoryStore, PersistentSelection};
pub use time_utils::{ProgressView, format_time};
pub use transport::{PlayerCommand, Transport};

/// Stable identifier of a remote player.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId(value.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
