mod simulator;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pmoremote::{
    EntityId, LogPresenter, PersistentSelection, PlayerCommand, SyncConfig, SyncEngine,
    SyncError, SyncHandle, Transport,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::simulator::SimulatedTransport;

const SIMULATED_FAILURE_RATE: f64 = 0.05;
const DEMO_STEP: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = pmoconfig::get_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_min_level().unwrap_or_default()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let sync_config = SyncConfig::from_config(&config)?;
    info!(
        interval_ms = sync_config.effective_interval().as_millis() as u64,
        debug = sync_config.debug,
        "Starting PMORemote"
    );

    let transport: Arc<dyn Transport> = Arc::new(SimulatedTransport::new(SIMULATED_FAILURE_RATE));
    let mut engine = SyncEngine::new(
        transport,
        PersistentSelection::new(config.clone()),
        LogPresenter,
        sync_config,
    );
    if let Err(err) = engine.bootstrap().await {
        warn!(error = %err, "Initial discovery failed, will retry");
    }

    let (handle, requests) = SyncHandle::channel();
    let running = tokio::spawn(engine.run(requests));
    let demo = tokio::spawn(walk_through(handle.clone()));

    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;

    demo.abort();
    handle.shutdown().await?;
    let engine = running.await?;
    info!(ticks = engine.scheduler().ticks(), "PMORemote stopped");
    Ok(())
}

/// Discovers until at least one player answers.
async fn wait_for_players(handle: &SyncHandle) -> Result<Vec<EntityId>, SyncError> {
    loop {
        match handle.discover().await {
            Ok(players) if !players.is_empty() => return Ok(players),
            Ok(_) => info!("No player yet"),
            Err(SyncError::EngineStopped) => return Err(SyncError::EngineStopped),
            Err(err) => warn!(error = %err, "Discovery failed"),
        }
        tokio::time::sleep(DEMO_STEP).await;
    }
}

/// Plays the part of a user: browses the players, flips the views and
/// touches the volume.
async fn walk_through(handle: SyncHandle) {
    let players = match wait_for_players(&handle).await {
        Ok(players) => players,
        Err(_) => return,
    };
    let mut position = 0;
    loop {
        tokio::time::sleep(DEMO_STEP).await;
        position = (position + 1) % players.len();
        let id = players[position].clone();

        let steps = async {
            handle.activate_position(position).await?;
            handle.volume_up(id.clone()).await?;
            tokio::time::sleep(DEMO_STEP).await;
            handle.toggle_view().await?;
            tokio::time::sleep(DEMO_STEP).await;
            handle.toggle_view().await?;
            handle.send_command(id, PlayerCommand::Next).await
        };
        if let Err(err) = steps.await {
            warn!(error = %err, "Demo stopped");
            return;
        }
    }
}
