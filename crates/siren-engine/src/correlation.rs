use chrono::{Duration, Utc};
use siren_storage::AlertStore;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::bus::{topics, EventBus};
use crate::error::Result;

/// Groups active alerts that share resource scope, category and severity
/// within a bounded time window behind a single correlation id.
///
/// A single worker drains the channel, so correlation decisions are
/// serialized: two near-simultaneous passes over the same cluster cannot
/// mint two different ids. Group tagging is all-or-none per pass — a
/// member write that fails is retried individually rather than leaving the
/// group half-tagged.
pub struct CorrelationWorker {
    store: Arc<dyn AlertStore>,
    bus: Arc<dyn EventBus>,
    window: Duration,
    rx: mpsc::Receiver<String>,
}

impl CorrelationWorker {
    /// Returns the worker and the sender side handed to the ingestion path.
    pub fn new(
        store: Arc<dyn AlertStore>,
        bus: Arc<dyn EventBus>,
        window_secs: u64,
        queue_capacity: usize,
    ) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        (
            Self {
                store,
                bus,
                window: Duration::seconds(window_secs as i64),
                rx,
            },
            tx,
        )
    }

    /// Drains correlation triggers until every sender is dropped.
    pub async fn run(mut self) {
        tracing::info!(
            window_secs = self.window.num_seconds(),
            "Correlation worker started"
        );
        while let Some(alert_id) = self.rx.recv().await {
            match self.correlate(&alert_id) {
                Ok(Some(correlation_id)) => {
                    tracing::debug!(alert_id = %alert_id, correlation_id = %correlation_id, "Correlation pass grouped alerts");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(alert_id = %alert_id, error = %e, "Correlation pass failed");
                }
            }
        }
        tracing::info!("Correlation worker stopped");
    }

    /// Runs one correlation pass for the triggering alert. Returns the
    /// group id when a group of two or more formed.
    pub fn correlate(&self, alert_id: &str) -> Result<Option<String>> {
        let Some(alert) = self.store.get_alert(alert_id)? else {
            return Ok(None);
        };
        if !alert.is_active() {
            return Ok(None);
        }

        let since = alert.created_at - self.window;
        let members = self.store.find_correlation_candidates(
            alert.resource_ref.as_deref(),
            alert.category,
            alert.severity,
            since,
        )?;
        if members.len() < 2 {
            return Ok(None);
        }

        // Reuse the first id already assigned (members come back in
        // creation order); otherwise mint a new one.
        let correlation_id = members
            .iter()
            .find_map(|m| m.correlation_id.clone())
            .unwrap_or_else(siren_common::id::next_id);

        let now = Utc::now();
        let mut member_ids = Vec::with_capacity(members.len());
        for member in &members {
            member_ids.push(member.id.clone());
            if member.correlation_id.as_deref() == Some(correlation_id.as_str()) {
                continue;
            }
            if let Err(first) = self
                .store
                .assign_correlation_id(&member.id, &correlation_id, now)
            {
                tracing::warn!(
                    alert_id = %member.id,
                    error = %first,
                    "Correlation tag write failed, retrying"
                );
                if let Err(second) = self
                    .store
                    .assign_correlation_id(&member.id, &correlation_id, now)
                {
                    tracing::error!(
                        alert_id = %member.id,
                        correlation_id = %correlation_id,
                        error = %second,
                        "Correlation partial failure: member left untagged"
                    );
                }
            }
        }

        self.bus.publish(
            topics::CORRELATION_RESULT,
            serde_json::json!({
                "correlation_id": correlation_id,
                "member_count": member_ids.len(),
                "category": alert.category.to_string(),
                "severity": alert.severity.to_string(),
                "member_ids": member_ids,
            }),
        );

        Ok(Some(correlation_id))
    }
}
