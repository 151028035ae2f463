use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::notify::NotifyHub;

/// Compact once `threshold` appends have accumulated since the last
/// compaction. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task: check the WAL every `interval` and compact when due.
/// Also drops live notification channels nobody listens to anymore.
pub async fn run_compactor(engine: Arc<Engine>, hub: Arc<NotifyHub>, threshold: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        compact_if_due(&engine, threshold).await;
        let pruned = hub.prune();
        if pruned > 0 {
            debug!("pruned {pruned} idle notification channels");
        }
    }
}
