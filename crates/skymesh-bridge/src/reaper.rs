//! Stale track eviction.
//!
//! Sweeps the track store on a fixed interval and drops aircraft that have
//! sent nothing for longer than the configured threshold.

use crate::metrics::BridgeMetrics;
use crate::shutdown::sleep_or_cancel;
use crate::store::TrackStore;
use crate::supervisor::Supervised;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Periodically evicts tracks that have gone silent.
pub struct Reaper {
    store: Arc<TrackStore>,
    interval: Duration,
    stale_after: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl Reaper {
    pub fn new(store: Arc<TrackStore>, interval: Duration, stale_after: Duration, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            store,
            interval,
            stale_after,
            metrics,
        }
    }

    /// One eviction pass. Returns the number of tracks removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let removed = self.store.evict_stale(now, self.stale_after);
        let remaining = self.store.len();
        self.metrics.record_evicted(removed, remaining);
        if removed > 0 {
            debug!(removed, remaining, "Evicted stale tracks");
        }
        removed
    }

    pub async fn run_until(&self, shutdown: &CancellationToken) {
        while sleep_or_cancel(self.interval, shutdown).await {
            self.sweep(Instant::now());
        }
        debug!("Reaper stopped");
    }
}

#[async_trait]
impl Supervised for Reaper {
    fn name(&self) -> &'static str {
        "reaper"
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        self.run_until(&shutdown).await;
    }
}
