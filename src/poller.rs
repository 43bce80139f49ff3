// Background poller: fetch the room listing on a fixed interval and append to history.
// Polls run strictly one after another inside a single task, so ids follow wall-clock order.

use crate::avatar::AvatarResolver;
use crate::history::SnapshotHistory;
use crate::listing::ListingClient;
use crate::models::SnapshotStatus;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::Instrument;

/// Shared state and shutdown for the poller.
pub struct PollerDeps {
    pub listing: Arc<ListingClient>,
    pub history: Arc<SnapshotHistory>,
    /// Only read for the periodic stats line.
    pub avatars: Arc<AvatarResolver>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct PollerConfig {
    pub interval_secs: u64,
    /// How often to log service stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Runs one poll and records it. Upstream failures become a failed snapshot.
pub async fn poll_once(listing: &ListingClient, history: &SnapshotHistory) -> (u64, SnapshotStatus) {
    let outcome = listing.poll().await;
    let status = outcome.status();
    let id = history.append(outcome).await;
    tracing::info!(operation = "poll", id, status = ?status, "Updated groups");
    (id, status)
}

/// Spawns the poller. The first poll happens immediately, then once per interval.
pub fn spawn(deps: PollerDeps, config: PollerConfig) -> tokio::task::JoinHandle<()> {
    let PollerDeps {
        listing,
        history,
        avatars,
        mut shutdown_rx,
    } = deps;
    let PollerConfig {
        interval_secs,
        stats_log_interval_secs,
    } = config;

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let stats_log_interval = Duration::from_secs(stats_log_interval_secs);
        let mut stats_log_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + stats_log_interval,
            stats_log_interval,
        );
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut polls_total: u64 = 0;
        let mut polls_failed_total: u64 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let (_, status) = poll_once(&listing, &history).await;
                    polls_total += 1;
                    if status == SnapshotStatus::Failed {
                        polls_failed_total += 1;
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Poller shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let history_len = history.len().await;
                    let minimum_id = history.minimum_id().await.ok();
                    let avatars_cached = avatars.cached_len().await;
                    tracing::info!(
                        history_len,
                        minimum_id,
                        polls_total,
                        polls_failed_total,
                        avatars_cached,
                        "app stats"
                    );
                }
            }
        }
    }
    .instrument(tracing::debug_span!("poller", interval_secs)))
}
