use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::config::MAX_STALE_PENDING_HOURS;
use crate::db::store::HandoverStore;
use crate::error::Result;

/// Watches for handovers nobody has confirmed. Pending rows are never
/// touched here; follow-up happens outside the chain.
pub struct StalePendingMonitor {
    store: Arc<dyn HandoverStore>,
    max_age: Duration,
    interval: std::time::Duration,
}

impl StalePendingMonitor {
    pub fn new(store: Arc<dyn HandoverStore>, max_age_hours: i64, interval_secs: u64) -> Self {
        Self {
            store,
            // Config rejects these already; clamped so a direct caller can't panic or spin
            max_age: Duration::hours(max_age_hours.clamp(0, MAX_STALE_PENDING_HOURS)),
            interval: std::time::Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn scan(&self) -> Result<i64> {
        let cutoff = Utc::now() - self.max_age;
        let stale = self.store.count_pending_before(cutoff).await?;

        if stale > 0 {
            tracing::warn!(
                "{} handover(s) pending for more than {} hours",
                stale,
                self.max_age.num_hours()
            );
        } else {
            tracing::debug!("No stale pending handovers");
        }

        Ok(stale)
    }

    pub async fn run_periodic_scan(&self) -> Result<()> {
        loop {
            if let Err(e) = self.scan().await {
                tracing::error!("Failed to scan for stale handovers: {}", e);
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
