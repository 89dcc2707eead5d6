use chrono::{DateTime, Utc};
use siren_common::types::Alert;
use siren_notify::manager::NotificationManager;
use siren_notify::{NotificationEvent, NotificationKind};
use siren_storage::AlertStore;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::bus::{topics, EventBus};
use crate::error::Result;
use crate::lifecycle;
use crate::service::alert_event_payload;

/// Periodic sweep advancing the escalation level of OPEN alerts past their
/// deadline and re-notifying for each.
///
/// Each alert is an independent unit of work: one failure is logged and the
/// sweep continues. Re-entry is idempotent because the level-guarded store
/// update refuses to advance an alert a completed prior iteration already
/// handled.
pub struct EscalationSweeper {
    store: Arc<dyn AlertStore>,
    notifier: Arc<NotificationManager>,
    bus: Arc<dyn EventBus>,
    tick_secs: u64,
    batch_limit: usize,
}

impl EscalationSweeper {
    pub fn new(
        store: Arc<dyn AlertStore>,
        notifier: Arc<NotificationManager>,
        bus: Arc<dyn EventBus>,
        tick_secs: u64,
        batch_limit: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            bus,
            tick_secs,
            batch_limit,
        }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Escalation sweeper started");
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.sweep(Utc::now()).await {
                // Store-level failure: abort this tick, retry on the next.
                tracing::error!(error = %e, "Escalation sweep failed");
            }
        }
    }

    /// Runs one sweep at `now`. Returns how many alerts were escalated.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u32> {
        let due = self.store.query_due_for_escalation(now, self.batch_limit)?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut escalated = 0u32;
        for alert in due {
            match self.escalate_one(&alert, now).await {
                Ok(true) => escalated += 1,
                Ok(false) => {
                    tracing::debug!(alert_id = %alert.id, "Skipped: already advanced");
                }
                Err(e) => {
                    tracing::error!(alert_id = %alert.id, error = %e, "Failed to escalate alert");
                }
            }
        }

        if escalated > 0 {
            tracing::info!(escalated, "Escalation sweep completed");
        }
        Ok(escalated)
    }

    async fn escalate_one(&self, alert: &Alert, now: DateTime<Utc>) -> Result<bool> {
        let new_level = alert.escalation_level + 1;
        let next_at = now + lifecycle::escalation_interval(new_level);
        if !self
            .store
            .record_escalation(&alert.id, alert.escalation_level, next_at, now)?
        {
            return Ok(false);
        }

        let mut updated = alert.clone();
        updated.escalation_level = new_level;
        updated.next_escalation_at = Some(next_at);
        updated.updated_at = now;

        tracing::info!(
            alert_id = %updated.id,
            level = new_level,
            next_escalation_at = %next_at,
            "Alert escalated"
        );

        let event = NotificationEvent::from_alert(NotificationKind::Escalated, &updated, now);
        self.notifier.dispatch(&event).await;
        self.bus
            .publish(topics::ALERT_ESCALATED, alert_event_payload(&updated, now));
        Ok(true)
    }
}
