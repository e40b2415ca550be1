//! Periodic housekeeping — in-memory maintenance only, no IO.

use std::time::Duration;

use tokio::task::JoinHandle;

use geohub_domain::time::{self, Timestamp};

use crate::store::SharedStore;

/// Default period between two housekeeping passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Housekeeping settings.
#[derive(Debug, Clone, Copy)]
pub struct HousekeepingConfig {
    pub interval: Duration,
    /// Location history older than this is dropped.
    pub history_retention: Duration,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            history_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What one pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub history_pruned: usize,
    pub reports_pruned: usize,
}

/// Run a single pass against the store.
pub async fn run_once(
    store: &SharedStore,
    config: &HousekeepingConfig,
    now: Timestamp,
) -> HousekeepingReport {
    let retention = chrono::Duration::from_std(config.history_retention)
        .unwrap_or(chrono::Duration::MAX);
    let cutoff = now.checked_sub_signed(retention).unwrap_or(Timestamp::MIN_UTC);

    let mut store = store.lock().await;
    HousekeepingReport {
        history_pruned: store.tracker_mut().prune_history(cutoff),
        reports_pruned: store.prune_dangling_reports(),
    }
}

/// Spawn the periodic housekeeping task.
///
/// The first pass runs one full interval after start.
#[must_use]
pub fn spawn(store: SharedStore, config: HousekeepingConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = run_once(&store, &config, time::now()).await;
            tracing::debug!(
                history_pruned = report.history_pruned,
                reports_pruned = report.reports_pruned,
                "housekeeping pass done"
            );
        }
    })
}
