//! The synchronization engine.
//!
//! [`SyncEngine`] is the single owner of every piece of mutable state: the
//! roster, the active player, the rendered snapshots and the view mode. Fetches
//! run as spawned tasks whose completions come back to the engine, so
//! reconciliation, activation and ticks never run concurrently with each other
//! even though several fetches may be in flight at once.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::EntityId;
use crate::activation::{ActivationController, ActivationOutcome};
use crate::config::SyncConfig;
use crate::controls;
use crate::errors::{SyncError, TransportError};
use crate::model::{EntitySnapshot, ViewMode};
use crate::presenter::Presenter;
use crate::reconciler::{SignalSet, StateReconciler};
use crate::roster::EntityRoster;
use crate::scheduler::{FreshnessGuard, PollingScheduler, TickPlan};
use crate::selection::{KeyValueStore, PersistentSelection};
use crate::transport::{PlayerCommand, Transport};

const REQUEST_QUEUE_SIZE: usize = 32;

/// Outcome of a fetch issued by the engine.
#[derive(Debug)]
pub enum FetchCompletion {
    One {
        sequence: u64,
        id: EntityId,
        result: Result<EntitySnapshot, TransportError>,
    },
    All {
        sequence: u64,
        result: Result<Vec<EntitySnapshot>, TransportError>,
    },
}

/// Requests accepted by [`SyncEngine::run`].
#[derive(Debug)]
pub enum EngineRequest {
    Activate {
        id: EntityId,
        reply: oneshot::Sender<Result<bool, SyncError>>,
    },
    ActivatePosition {
        position: usize,
        reply: oneshot::Sender<Result<bool, SyncError>>,
    },
    /// Runs a discovery batch; replies with the whole roster.
    Discover {
        reply: oneshot::Sender<Result<Vec<EntityId>, SyncError>>,
    },
    ShowAggregateView,
    ShowEntityView,
    ToggleView,
    Command {
        id: EntityId,
        command: PlayerCommand,
    },
    VolumeUp(EntityId),
    VolumeDown(EntityId),
    Shutdown,
}

/// Cloneable front end to a running engine.
#[derive(Clone, Debug)]
pub struct SyncHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl SyncHandle {
    /// Creates a handle and the receiver to pass to [`SyncEngine::run`].
    pub fn channel() -> (Self, mpsc::Receiver<EngineRequest>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        (Self { tx }, rx)
    }

    async fn send(&self, request: EngineRequest) -> Result<(), SyncError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| SyncError::EngineStopped)
    }

    /// Returns `true` when the active player changed.
    pub async fn activate(&self, id: EntityId) -> Result<bool, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Activate { id, reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)?
    }

    pub async fn activate_position(&self, position: usize) -> Result<bool, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::ActivatePosition { position, reply })
            .await?;
        rx.await.map_err(|_| SyncError::EngineStopped)?
    }

    /// Asks the engine to discover the players again, typically after a
    /// bootstrap that failed or found nobody. Returns the roster.
    pub async fn discover(&self) -> Result<Vec<EntityId>, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Discover { reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)?
    }

    pub async fn show_aggregate_view(&self) -> Result<(), SyncError> {
        self.send(EngineRequest::ShowAggregateView).await
    }

    pub async fn show_entity_view(&self) -> Result<(), SyncError> {
        self.send(EngineRequest::ShowEntityView).await
    }

    pub async fn toggle_view(&self) -> Result<(), SyncError> {
        self.send(EngineRequest::ToggleView).await
    }

    pub async fn send_command(&self, id: EntityId, command: PlayerCommand) -> Result<(), SyncError> {
        self.send(EngineRequest::Command { id, command }).await
    }

    pub async fn volume_up(&self, id: EntityId) -> Result<(), SyncError> {
        self.send(EngineRequest::VolumeUp(id)).await
    }

    pub async fn volume_down(&self, id: EntityId) -> Result<(), SyncError> {
        self.send(EngineRequest::VolumeDown(id)).await
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(EngineRequest::Shutdown).await
    }
}

pub struct SyncEngine<K: KeyValueStore, P: Presenter> {
    transport: Arc<dyn Transport>,
    roster: EntityRoster,
    activation: ActivationController<K>,
    reconciler: StateReconciler,
    scheduler: PollingScheduler,
    freshness: FreshnessGuard,
    view: ViewMode,
    presenter: P,
    config: SyncConfig,
    fetches: JoinSet<FetchCompletion>,
    commands: JoinSet<()>,
}

impl<K: KeyValueStore, P: Presenter> SyncEngine<K, P> {
    pub fn new(
        transport: Arc<dyn Transport>,
        selection: PersistentSelection<K>,
        presenter: P,
        config: SyncConfig,
    ) -> Self {
        Self {
            transport,
            roster: EntityRoster::new(),
            activation: ActivationController::new(selection),
            reconciler: StateReconciler::new(),
            scheduler: PollingScheduler::new(&config),
            freshness: FreshnessGuard::new(),
            view: ViewMode::default(),
            presenter,
            config,
            fetches: JoinSet::new(),
            commands: JoinSet::new(),
        }
    }

    pub fn roster(&self) -> &EntityRoster {
        &self.roster
    }

    fn roster_ids(&self) -> Vec<EntityId> {
        self.roster.all().iter().map(|e| e.id.clone()).collect()
    }

    pub fn active(&self) -> Option<&EntityId> {
        self.activation.active()
    }

    pub fn activation(&self) -> &ActivationController<K> {
        &self.activation
    }

    pub fn reconciler(&self) -> &StateReconciler {
        &self.reconciler
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Fetches still running.
    pub fn in_flight(&self) -> usize {
        self.fetches.len()
    }

    /// Discovers the players through the transport, restores the active
    /// player and draws the initial state of everyone.
    ///
    /// Safe to call again: known players are skipped, which is how a failed
    /// or empty first discovery is retried (see [`SyncHandle::discover`]).
    pub async fn bootstrap(&mut self) -> Result<(), SyncError> {
        let sequence = self.freshness.issue();
        let snapshots = self.transport.fetch_all_states().await?;
        info!(players = snapshots.len(), "Players discovered");

        self.discover(&snapshots);
        for snapshot in snapshots {
            self.apply_snapshot(sequence, snapshot);
        }
        Ok(())
    }

    /// Registers one discovery batch and returns how many players it added.
    ///
    /// The active player is restored once the whole batch is registered,
    /// never per player. With an empty batch the restore waits for the next
    /// non-empty one. `on_all_ready` only fires when the batch changed
    /// something: a new player or a completed restore.
    pub fn discover(&mut self, snapshots: &[EntitySnapshot]) -> usize {
        let mut added = 0;
        for snapshot in snapshots {
            match self.roster.register(snapshot.entity(), &mut self.presenter) {
                Ok(_) => added += 1,
                Err(err) => debug!(entity = snapshot.id.as_str(), error = %err, "Skipping player"),
            }
        }

        let restored = if self.activation.is_restore_pending() {
            self.activation.complete_deferred_restore(&self.roster)
        } else if self.activation.active().is_none() {
            self.activation.restore_on_startup(&self.roster)
        } else {
            Ok(None)
        };

        let restored = match restored {
            Ok(Some(outcome)) => {
                self.on_activation(outcome);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "Cannot restore active player");
                false
            }
        };

        if !self.roster.is_empty() && (added > 0 || restored) {
            self.presenter.on_all_ready(self.roster.all());
        }
        added
    }

    /// User selection. Returns `true` when the active player changed.
    pub fn activate(&mut self, id: &EntityId) -> Result<bool, SyncError> {
        let outcome = self.activation.activate(&self.roster, id)?;
        Ok(self.on_activation(outcome))
    }

    /// Carousel navigation. Returns `true` when the active player changed.
    pub fn activate_position(&mut self, position: usize) -> Result<bool, SyncError> {
        let outcome = self.activation.activate_position(&self.roster, position)?;
        Ok(self.on_activation(outcome))
    }

    fn on_activation(&mut self, outcome: ActivationOutcome) -> bool {
        match outcome {
            ActivationOutcome::Unchanged => false,
            ActivationOutcome::Switched { entity, .. } => {
                // pull fresh state so the switch never shows stale data for long
                self.request_refresh(&entity.id);
                self.presenter.on_entity_activated(&entity);
                true
            }
        }
    }

    pub fn show_aggregate_view(&mut self) {
        if self.view == ViewMode::Aggregate {
            return;
        }
        self.view = ViewMode::Aggregate;
        self.presenter.on_view_changed(self.view);
    }

    /// Back to the active player's view, refreshing it at once.
    pub fn show_entity_view(&mut self) {
        if self.view == ViewMode::Entity {
            return;
        }
        self.view = ViewMode::Entity;
        self.presenter.on_view_changed(self.view);
        if let Some(id) = self.activation.active().cloned() {
            self.request_refresh(&id);
        }
    }

    pub fn toggle_view(&mut self) {
        match self.view {
            ViewMode::Entity => self.show_aggregate_view(),
            ViewMode::Aggregate => self.show_entity_view(),
        }
    }

    /// Issues the fetches of one polling tick without waiting for them.
    pub fn tick(&mut self) -> TickPlan {
        let plan = self
            .scheduler
            .plan(self.view, self.activation.active(), &self.roster);
        match &plan {
            TickPlan::Idle => trace!("Nothing to poll"),
            TickPlan::RefreshActive(id) => self.request_refresh(id),
            TickPlan::RefreshAll => self.request_refresh_all(),
        }
        plan
    }

    fn request_refresh(&mut self, id: &EntityId) {
        let sequence = self.freshness.issue();
        let transport = Arc::clone(&self.transport);
        let id = id.clone();
        trace!(entity = id.as_str(), sequence, "Refreshing player");
        self.fetches.spawn(async move {
            let result = transport.fetch_state(&id).await;
            FetchCompletion::One {
                sequence,
                id,
                result,
            }
        });
    }

    fn request_refresh_all(&mut self) {
        let sequence = self.freshness.issue();
        let transport = Arc::clone(&self.transport);
        trace!(sequence, "Refreshing every player");
        self.fetches.spawn(async move {
            let result = transport.fetch_all_states().await;
            FetchCompletion::All { sequence, result }
        });
    }

    /// Feeds one fetch result to the reconciler and the presenter.
    pub fn apply(&mut self, completion: FetchCompletion) {
        match completion {
            FetchCompletion::One {
                sequence,
                id,
                result,
            } => match result {
                Ok(snapshot) if snapshot.id == id => {
                    self.apply_snapshot(sequence, snapshot);
                }
                Ok(snapshot) => {
                    warn!(
                        entity = id.as_str(),
                        received = snapshot.id.as_str(),
                        "Transport answered for another player"
                    );
                }
                Err(err) => {
                    warn!(entity = id.as_str(), error = %err, "Refresh failed");
                    let entity = self.roster.find(&id);
                    self.presenter.on_fetch_failed(entity, &err);
                }
            },
            FetchCompletion::All { sequence, result } => match result {
                Ok(snapshots) => {
                    for snapshot in snapshots {
                        self.apply_snapshot(sequence, snapshot);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Refresh of every player failed");
                    self.presenter.on_fetch_failed(None, &err);
                }
            },
        }
    }

    fn apply_snapshot(&mut self, sequence: u64, snapshot: EntitySnapshot) -> Option<SignalSet> {
        let snapshot = snapshot.normalized();
        let id = snapshot.id.clone();

        let Some(entity) = self.roster.find(&id) else {
            debug!(entity = id.as_str(), "Ignoring state of unknown player");
            return None;
        };
        if !self.freshness.accept(&id, sequence) {
            debug!(entity = id.as_str(), sequence, "Discarding stale state");
            return None;
        }

        let signals = self.reconciler.reconcile(snapshot);
        let rendered = self.reconciler.rendered(&id)?;
        self.presenter.on_entity_updated(entity, rendered, &signals);
        Some(signals)
    }

    fn on_joined(&mut self, joined: Result<FetchCompletion, JoinError>) {
        match joined {
            Ok(completion) => self.apply(completion),
            Err(err) => warn!(error = %err, "Fetch task aborted"),
        }
    }

    /// Sends a command to a player without waiting for its acknowledgment.
    pub fn send_command(&mut self, id: &EntityId, command: PlayerCommand) -> Result<(), SyncError> {
        if !self.roster.contains(id) {
            return Err(SyncError::invalid_reference(id));
        }

        debug!(entity = id.as_str(), command = command.name(), "Sending command");
        let transport = Arc::clone(&self.transport);
        let id = id.clone();
        self.commands.spawn(async move {
            if let Err(err) = command.dispatch(transport.as_ref(), &id).await {
                warn!(entity = id.as_str(), command = command.name(), error = %err, "Command failed");
            }
        });
        Ok(())
    }

    pub fn volume_up(&mut self, id: &EntityId) -> Result<(), SyncError> {
        self.step_volume(id, true)
    }

    pub fn volume_down(&mut self, id: &EntityId) -> Result<(), SyncError> {
        self.step_volume(id, false)
    }

    fn step_volume(&mut self, id: &EntityId, up: bool) -> Result<(), SyncError> {
        let Some(current) = self.reconciler.rendered(id).map(|s| s.volume) else {
            debug!(entity = id.as_str(), "Volume not known yet");
            return Ok(());
        };
        let volume = controls::volume_step(current, self.config.volume_step, up);
        self.send_command(id, PlayerCommand::SetVolume(volume))
    }

    /// Click at `x` on a volume bar `width` wide.
    pub fn set_volume_from_click(&mut self, id: &EntityId, x: f64, width: f64) -> Result<(), SyncError> {
        match controls::volume_from_click(x, width) {
            Some(volume) => self.send_command(id, PlayerCommand::SetVolume(volume)),
            None => Ok(()),
        }
    }

    /// Click at `x` on a progress bar `width` wide. Ignored for live streams.
    pub fn seek_from_click(&mut self, id: &EntityId, x: f64, width: f64) -> Result<(), SyncError> {
        let duration = self.reconciler.rendered(id).map(|s| s.duration).unwrap_or(0);
        match controls::seek_from_click(x, width, duration) {
            Some(seconds) => self.send_command(id, PlayerCommand::SetPosition(seconds)),
            None => Ok(()),
        }
    }

    /// Waits for every outstanding fetch and command and applies the fetch
    /// results in completion order.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.fetches.join_next().await {
            self.on_joined(joined);
        }
        while self.commands.join_next().await.is_some() {}
    }

    fn handle(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::Activate { id, reply } => {
                let _ = reply.send(self.activate(&id));
            }
            EngineRequest::ActivatePosition { position, reply } => {
                let _ = reply.send(self.activate_position(position));
            }
            EngineRequest::ShowAggregateView => self.show_aggregate_view(),
            EngineRequest::ShowEntityView => self.show_entity_view(),
            EngineRequest::ToggleView => self.toggle_view(),
            EngineRequest::Command { id, command } => {
                if let Err(err) = self.send_command(&id, command) {
                    warn!(error = %err, "Command ignored");
                }
            }
            EngineRequest::VolumeUp(id) => {
                if let Err(err) = self.volume_up(&id) {
                    warn!(error = %err, "Volume up ignored");
                }
            }
            EngineRequest::VolumeDown(id) => {
                if let Err(err) = self.volume_down(&id) {
                    warn!(error = %err, "Volume down ignored");
                }
            }
            // handled by the event loop
            EngineRequest::Discover { .. } | EngineRequest::Shutdown => {}
        }
    }

    /// Event loop: polls on every timer tick, applies fetch results as they
    /// complete and serves requests from [`SyncHandle`]s.
    ///
    /// Returns the engine once a shutdown is requested or every handle is
    /// dropped; outstanding fetches are then aborted.
    pub async fn run(mut self, mut requests: mpsc::Receiver<EngineRequest>) -> Self {
        let mut timer = self.scheduler.timer();
        info!(interval_ms = self.scheduler.interval().as_millis() as u64, "Start polling");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.tick();
                }
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    self.on_joined(joined);
                }
                Some(_) = self.commands.join_next(), if !self.commands.is_empty() => {}
                request = requests.recv() => match request {
                    Some(EngineRequest::Shutdown) | None => break,
                    Some(EngineRequest::Discover { reply }) => {
                        let result = self.bootstrap().await.map(|_| self.roster_ids());
                        if let Err(err) = &result {
                            warn!(error = %err, "Discovery failed");
                        }
                        let _ = reply.send(result);
                    }
                    Some(request) => self.handle(request),
                },
            }
        }

        info!("Stop polling");
        self.fetches.shutdown().await;
        self.commands.shutdown().await;
        self
    }
}
