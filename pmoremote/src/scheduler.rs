//! Polling policy.
//!
//! A single repeating timer drives every refresh. On each tick the scheduler
//! picks between refreshing only the active player (cheap) and refreshing
//! every player (needed when the aggregate view is visible). It never
//! retries: a failed fetch simply waits for the next tick.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use crate::EntityId;
use crate::config::{MAX_POLL_INTERVAL, SyncConfig};
use crate::model::ViewMode;
use crate::roster::EntityRoster;

/// What a tick has to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickPlan {
    /// Nothing to do: empty roster or no active player.
    Idle,
    RefreshActive(EntityId),
    RefreshAll,
}

#[derive(Debug)]
pub struct PollingScheduler {
    interval: Duration,
    ticks: u64,
}

impl PollingScheduler {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            interval: config.effective_interval().min(MAX_POLL_INTERVAL),
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks planned so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Timer firing every [`interval`](Self::interval), first tick one
    /// interval from now. Late ticks are delayed rather than bunched.
    pub fn timer(&self) -> Interval {
        let now = tokio::time::Instant::now();
        let start = now.checked_add(self.interval).unwrap_or(now);
        let mut timer = tokio::time::interval_at(start, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    pub fn plan(
        &mut self,
        view: ViewMode,
        active: Option<&EntityId>,
        roster: &EntityRoster,
    ) -> TickPlan {
        self.ticks = self.ticks.wrapping_add(1);

        if roster.is_empty() {
            return TickPlan::Idle;
        }
        match (view, active) {
            (ViewMode::Aggregate, _) => TickPlan::RefreshAll,
            (ViewMode::Entity, Some(id)) => TickPlan::RefreshActive(id.clone()),
            (ViewMode::Entity, None) => TickPlan::Idle,
        }
    }
}

/// Discards fetch results that complete after a newer one was applied.
///
/// Every fetch is stamped with a sequence number when it is issued; several
/// fetches of the same player may be in flight and resolve in any order.
#[derive(Debug, Default)]
pub struct FreshnessGuard {
    next_sequence: u64,
    applied: HashMap<EntityId, u64>,
}

impl FreshnessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp for a fetch about to be issued.
    pub fn issue(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Records `sequence` as applied to `id` unless a newer fetch already was.
    ///
    /// Returns `false` for a stale result.
    pub fn accept(&mut self, id: &EntityId, sequence: u64) -> bool {
        match self.applied.get(id) {
            Some(&last) if last > sequence => false,
            _ => {
                self.applied.insert(id.clone(), sequence);
                true
            }
        }
    }
}
