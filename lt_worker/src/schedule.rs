//! Periodic bulk update of every player, paced to stay under the Riot API rate limit.
//!
//! Players are updated one at a time. The pacing is the only rate limiter.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::retry::RetryPolicy;
use crate::riot::RankedApi;
use crate::store::{Store, StoreError};
use crate::webjob::{update_player, UpdateContext};

/// Bulk update timing and rate limit parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between run starts.
    pub interval: Duration,
    /// Requests allowed per rate limit window.
    pub rate_per_window: u32,
    /// Riot API requests needed to update one player.
    pub requests_per_player: u32,
    /// Safety factor dividing the rate limit.
    pub window_factor: u32,
    /// Sleep between batches.
    pub batch_cooldown: Duration,
    /// Sleep between players within a batch.
    pub player_delay: Duration,
    /// Per-request retry policy.
    pub retry: RetryPolicy,
}
impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(330),
            rate_per_window: 100,
            requests_per_player: 4,
            window_factor: 2,
            batch_cooldown: Duration::from_secs(120),
            player_delay: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}
impl SchedulerConfig {
    /// Players per batch: `rate / (requests_per_player * window_factor)`, at least one.
    pub fn batch_size(&self) -> usize {
        let per_batch = self.requests_per_player.max(1) * self.window_factor.max(1);
        (self.rate_per_window / per_batch).max(1) as usize
    }
}

/// Counts from one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    /// Players fetched.
    pub total: usize,
    /// Players updated.
    pub succeeded: usize,
    /// Players skipped or failed.
    pub failed: usize,
    /// Batches processed.
    pub batches: usize,
}

/// Why a run did not happen.
#[derive(Debug)]
pub enum RunError {
    /// Another run holds the lock.
    AlreadyRunning,
    /// Could not fetch the player list.
    ListPlayers(StoreError),
}
impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::AlreadyRunning => f.write_str("An update is already running."),
            RunError::ListPlayers(e) => write!(f, "Failed to list players: {}", e),
        }
    }
}
impl std::error::Error for RunError {}

struct Pacing<'a> {
    batch_size: usize,
    batch_cooldown: Duration,
    player_delay: Duration,
    retry: &'a RetryPolicy,
}

/// Owns the store and Riot API, and runs bulk updates over them.
pub struct Scheduler<S, A> {
    /// Database.
    pub store: S,
    /// Riot API.
    pub api: A,
    /// Timing.
    pub config: SchedulerConfig,
    running: Mutex<()>,
    immediate_retry: RetryPolicy,
}
impl<S: Store, A: RankedApi> Scheduler<S, A> {
    /// Create an idle scheduler.
    pub fn new(store: S, api: A, config: SchedulerConfig) -> Self {
        Self {
            store,
            api,
            config,
            running: Mutex::new(()),
            immediate_retry: RetryPolicy::none(),
        }
    }

    /// Start the periodic task. The first run starts immediately.
    ///
    /// Each tick spawns its own run, so a failed run never stops later ones. A tick which finds
    /// the previous run still going is skipped.
    pub fn start(&'static self) -> JoinHandle<()>
    where
        S: 'static,
        A: 'static,
    {
        log::info!(
            "Starting scheduler: every {:?}, batches of {}.",
            self.config.interval,
            self.config.batch_size(),
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tokio::spawn(async move {
                    match self.run_once().await {
                        Ok(summary) => log::info!("Scheduled update complete: {:?}", summary),
                        Err(RunError::AlreadyRunning) => {
                            log::warn!("Previous update still running, skipping this one.")
                        }
                        Err(e) => log::error!("Scheduled update failed: {}", e),
                    }
                });
            }
        })
    }

    /// One paced run over all players.
    pub async fn run_once(&self) -> Result<RunSummary, RunError> {
        self.run(Pacing {
            batch_size: self.config.batch_size(),
            batch_cooldown: self.config.batch_cooldown,
            player_delay: self.config.player_delay,
            retry: &self.config.retry,
        })
        .await
    }

    /// One unpaced run over all players, without retries. For manually triggered updates.
    pub async fn update_all_now(&self) -> Result<RunSummary, RunError> {
        self.run(Pacing {
            batch_size: usize::MAX,
            batch_cooldown: Duration::ZERO,
            player_delay: Duration::ZERO,
            retry: &self.immediate_retry,
        })
        .await
    }

    /// If a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    async fn run(&self, pacing: Pacing<'_>) -> Result<RunSummary, RunError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| RunError::AlreadyRunning)?;

        let players = self
            .store
            .list_players()
            .await
            .map_err(RunError::ListPlayers)?;
        let ctx = UpdateContext {
            store: &self.store,
            api: &self.api,
            retry: pacing.retry,
        };
        let batch_size = pacing.batch_size.max(1);
        log::info!(
            "Updating {} players in batches of {}.",
            players.len(),
            batch_size.min(players.len()),
        );

        let mut summary = RunSummary {
            total: players.len(),
            ..RunSummary::default()
        };
        for (i, batch) in players.chunks(batch_size).enumerate() {
            if 0 < i {
                log::debug!("Batch cooldown {:?}.", pacing.batch_cooldown);
                tokio::time::sleep(pacing.batch_cooldown).await;
            }
            summary.batches += 1;
            for (j, player) in batch.iter().enumerate() {
                if 0 < j && !pacing.player_delay.is_zero() {
                    tokio::time::sleep(pacing.player_delay).await;
                }
                match update_player(ctx, player, Utc::now()).await {
                    Ok(outcome) if outcome.is_success() => summary.succeeded += 1,
                    Ok(_) => summary.failed += 1,
                    Err(e) => {
                        log::error!(
                            "Failed to save `{}` (ID {}): {}",
                            player.summoner_name,
                            player.id,
                            e
                        );
                        summary.failed += 1;
                    }
                }
            }
            log::info!(
                "Batch {} done: {}/{} succeeded so far.",
                summary.batches,
                summary.succeeded,
                summary.total,
            );
        }
        Ok(summary)
    }
}
