use chrono::{DateTime, Duration as ChronoDuration, Utc};
use siren_storage::AlertStore;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::bus::{topics, EventBus};
use crate::error::Result;
use crate::service::alert_event_payload;

const AUTO_RESOLVE_NOTES: &str = "Auto-resolved due to inactivity";

/// Periodic sweep resolving active alerts whose last occurrence is older
/// than the staleness threshold. Per-alert transactions; a failure for one
/// alert leaves the rest of the batch to proceed.
pub struct AutoResolveSweeper {
    store: Arc<dyn AlertStore>,
    bus: Arc<dyn EventBus>,
    tick_secs: u64,
    stale_after: ChronoDuration,
    batch_limit: usize,
}

impl AutoResolveSweeper {
    pub fn new(
        store: Arc<dyn AlertStore>,
        bus: Arc<dyn EventBus>,
        tick_secs: u64,
        stale_after_hours: u64,
        batch_limit: usize,
    ) -> Self {
        Self {
            store,
            bus,
            tick_secs,
            stale_after: ChronoDuration::hours(stale_after_hours as i64),
            batch_limit,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.tick_secs,
            stale_after_hours = self.stale_after.num_hours(),
            "Auto-resolve sweeper started"
        );
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.sweep(Utc::now()) {
                tracing::error!(error = %e, "Auto-resolve sweep failed");
            }
        }
    }

    /// Runs one sweep at `now`. Returns how many alerts were auto-resolved.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<u32> {
        let cutoff = now - self.stale_after;
        let stale = self.store.query_stale_active(cutoff, self.batch_limit)?;
        if stale.is_empty() {
            return Ok(0);
        }

        let mut resolved = 0u32;
        for alert in stale {
            match self
                .store
                .mark_resolved(&alert.id, None, Some(AUTO_RESOLVE_NOTES), true, now)
            {
                Ok(true) => {
                    resolved += 1;
                    let mut updated = alert;
                    updated.status = siren_common::types::AlertStatus::Resolved;
                    updated.auto_resolved = true;
                    tracing::info!(alert_id = %updated.id, "Alert auto-resolved");
                    self.bus.publish(
                        topics::ALERT_AUTO_RESOLVED,
                        alert_event_payload(&updated, now),
                    );
                }
                Ok(false) => {
                    tracing::debug!(alert_id = %alert.id, "Skipped: transitioned concurrently");
                }
                Err(e) => {
                    tracing::error!(alert_id = %alert.id, error = %e, "Failed to auto-resolve alert");
                }
            }
        }

        if resolved > 0 {
            tracing::info!(resolved, "Auto-resolve sweep completed");
        }
        Ok(resolved)
    }
}
