use chrono::{DateTime, Duration, Utc};
use siren_common::types::{Alert, AlertStats, AlertStatus, CreateAlertRequest};
use siren_notify::manager::NotificationManager;
use siren_notify::{NotificationEvent, NotificationKind};
use siren_storage::error::StoreError;
use siren_storage::{AlertFilter, AlertStore, UpsertOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::bus::{topics, EventBus};
use crate::error::{AlertError, Result};
use crate::fingerprint;
use crate::lifecycle;
use crate::rules::RuleCache;

/// Lookup of monitored resources by reference (read-only collaborator).
///
/// A failed lookup must never block alert creation: the ingestion path
/// stores the raw reference and proceeds.
pub trait ResourceDirectory: Send + Sync {
    fn resolve(&self, reference: &str) -> Option<String>;
}

/// Directory that accepts every reference as already canonical.
pub struct PassthroughDirectory;

impl ResourceDirectory for PassthroughDirectory {
    fn resolve(&self, reference: &str) -> Option<String> {
        Some(reference.to_string())
    }
}

/// Standard event payload published for every lifecycle change.
pub fn alert_event_payload(alert: &Alert, now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "alert_id": alert.id,
        "severity": alert.severity.to_string(),
        "status": alert.status.to_string(),
        "resource_ref": alert.resource_ref,
        "timestamp": now.to_rfc3339(),
    })
}

/// Synchronous entry point of the engine: ingestion/deduplication plus the
/// lifecycle transitions. Correlation is handed off to the worker through
/// an mpsc channel; the caller of [`AlertService::submit`] never waits on
/// it.
pub struct AlertService {
    store: Arc<dyn AlertStore>,
    notifier: Arc<NotificationManager>,
    bus: Arc<dyn EventBus>,
    directory: Arc<dyn ResourceDirectory>,
    rules: Arc<RuleCache>,
    correlation_tx: mpsc::Sender<String>,
    critical_notify_timeout: std::time::Duration,
}

impl AlertService {
    pub fn new(
        store: Arc<dyn AlertStore>,
        notifier: Arc<NotificationManager>,
        bus: Arc<dyn EventBus>,
        directory: Arc<dyn ResourceDirectory>,
        rules: Arc<RuleCache>,
        correlation_tx: mpsc::Sender<String>,
        critical_notify_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            bus,
            directory,
            rules,
            correlation_tx,
            critical_notify_timeout,
        }
    }

    /// Ingest a creation signal: either dedup-merge into the active alert
    /// carrying the same fingerprint, or persist a new OPEN alert.
    pub async fn submit(&self, request: CreateAlertRequest) -> Result<Alert> {
        let now = Utc::now();

        let resource_ref = match &request.resource_ref {
            Some(reference) => match self.directory.resolve(reference) {
                Some(id) => Some(id),
                None => {
                    tracing::warn!(
                        resource = %reference,
                        "Resource lookup failed, storing raw reference"
                    );
                    Some(reference.clone())
                }
            },
            None => None,
        };

        let mut fp = fingerprint::fingerprint(
            &request.title,
            request.category,
            &request.source,
            resource_ref.as_deref(),
            request.rule_id.as_deref(),
        );
        if fp.is_empty() {
            // Degrades deduplication for this one alert but never blocks
            // ingestion.
            tracing::warn!(title = %request.title, "Empty fingerprint, substituting random id");
            fp = siren_common::id::next_id();
        }

        // Rule inside an active suppression window: persist directly as
        // suppressed, skip paging and correlation. Suppressed rows sit
        // outside the active-fingerprint subset.
        if let Some(rule_id) = &request.rule_id {
            if let Some(until) = self.rules.suppressed_until(rule_id, now) {
                let mut alert = build_alert(&request, resource_ref, fp, now);
                alert.status = AlertStatus::Suppressed;
                alert.next_escalation_at = None;
                alert
                    .metadata
                    .insert("suppressed_until".to_string(), until.to_rfc3339());
                self.store.insert_alert(&alert)?;
                tracing::info!(alert_id = %alert.id, rule_id = %rule_id, "Alert suppressed on arrival");
                self.bus
                    .publish(topics::ALERT_SUPPRESSED, alert_event_payload(&alert, now));
                return Ok(alert);
            }
        }

        let candidate = build_alert(&request, resource_ref, fp, now);
        let outcome = self
            .store
            .upsert_by_fingerprint(&candidate)
            .map_err(|e| match e {
                StoreError::FingerprintConflict { fingerprint } => {
                    AlertError::DuplicateConflict { fingerprint }
                }
                other => AlertError::Store(other),
            })?;

        match &outcome {
            UpsertOutcome::Deduplicated(alert) => {
                tracing::debug!(
                    alert_id = %alert.id,
                    occurrence_count = alert.occurrence_count,
                    "Deduplicated into existing alert"
                );
                self.bus
                    .publish(topics::ALERT_UPDATED, alert_event_payload(alert, now));
            }
            UpsertOutcome::Created(alert) => {
                tracing::info!(
                    alert_id = %alert.id,
                    severity = %alert.severity,
                    source = %alert.source,
                    "Alert created"
                );
                self.bus
                    .publish(topics::ALERT_CREATED, alert_event_payload(alert, now));
                if alert.is_critical() {
                    // Synchronous so critical paging cannot be dropped
                    // between persist and notify; bounded so a slow channel
                    // cannot stall ingestion.
                    let event = NotificationEvent::from_alert(NotificationKind::Created, alert, now);
                    if tokio::time::timeout(
                        self.critical_notify_timeout,
                        self.notifier.dispatch(&event),
                    )
                    .await
                    .is_err()
                    {
                        tracing::warn!(
                            alert_id = %alert.id,
                            "Critical alert notification timed out"
                        );
                    }
                }
            }
        }

        let alert = outcome.into_alert();
        if let Err(e) = self.correlation_tx.try_send(alert.id.clone()) {
            tracing::warn!(alert_id = %alert.id, error = %e, "Failed to schedule correlation pass");
        }
        Ok(alert)
    }

    /// Legal only from OPEN.
    pub fn acknowledge(&self, id: &str, actor: &str, notes: Option<&str>) -> Result<Alert> {
        let alert = self.get(id)?;
        if !lifecycle::can_acknowledge(alert.status) {
            return Err(AlertError::InvalidTransition {
                id: id.to_string(),
                status: alert.status,
                operation: "acknowledge",
            });
        }

        let now = Utc::now();
        if !self.store.mark_acknowledged(id, actor, notes, now)? {
            // Lost a race: the alert left OPEN between the read and the
            // guarded update.
            let current = self.get(id)?;
            return Err(AlertError::InvalidTransition {
                id: id.to_string(),
                status: current.status,
                operation: "acknowledge",
            });
        }

        let updated = self.get(id)?;
        tracing::info!(alert_id = %id, actor = %actor, "Alert acknowledged");
        self.bus
            .publish(topics::ALERT_ACKNOWLEDGED, alert_event_payload(&updated, now));
        Ok(updated)
    }

    /// Legal from OPEN or ACKNOWLEDGED. Clears the escalation deadline.
    pub fn resolve(&self, id: &str, actor: &str, notes: Option<&str>) -> Result<Alert> {
        let alert = self.get(id)?;
        if !lifecycle::can_resolve(alert.status) {
            return Err(AlertError::InvalidTransition {
                id: id.to_string(),
                status: alert.status,
                operation: "resolve",
            });
        }

        let now = Utc::now();
        if !self.store.mark_resolved(id, Some(actor), notes, false, now)? {
            let current = self.get(id)?;
            return Err(AlertError::InvalidTransition {
                id: id.to_string(),
                status: current.status,
                operation: "resolve",
            });
        }

        let updated = self.get(id)?;
        tracing::info!(alert_id = %id, actor = %actor, "Alert resolved");
        self.bus
            .publish(topics::ALERT_RESOLVED, alert_event_payload(&updated, now));
        Ok(updated)
    }

    /// Suppresses every OPEN alert attached to the rule and stamps the
    /// rule's suppression window so new arrivals are suppressed too.
    ///
    /// Suppressed alerts are never reactivated automatically; when the
    /// window elapses it only stops affecting new arrivals.
    pub fn suppress(&self, rule_id: &str, duration_minutes: u32) -> Result<Vec<Alert>> {
        let now = Utc::now();
        let until = now + Duration::minutes(i64::from(duration_minutes));

        if !self.store.set_rule_suppressed_until(rule_id, until, now)? {
            tracing::debug!(rule_id, "No rule row; suppressing existing alerts only");
        }
        self.rules.note_suppressed(rule_id, until);

        let suppressed = self.store.mark_suppressed_by_rule(rule_id, until, now)?;
        for alert in &suppressed {
            self.bus
                .publish(topics::ALERT_SUPPRESSED, alert_event_payload(alert, now));
        }
        tracing::info!(
            rule_id,
            count = suppressed.len(),
            until = %until,
            "Alerts suppressed by rule"
        );
        Ok(suppressed)
    }

    /// Acknowledges each OPEN alert in `ids`; unknown ids and alerts in any
    /// other status are skipped without error. Partial success: items
    /// acknowledged before a failure stay acknowledged.
    pub fn bulk_acknowledge(&self, ids: &[String], actor: &str, notes: Option<&str>) -> Vec<Alert> {
        let now = Utc::now();
        let mut acknowledged = Vec::new();
        for id in ids {
            match self.store.get_alert(id) {
                Ok(Some(alert)) if lifecycle::can_acknowledge(alert.status) => {
                    match self.store.mark_acknowledged(id, actor, notes, now) {
                        Ok(true) => match self.store.get_alert(id) {
                            Ok(Some(updated)) => {
                                self.bus.publish(
                                    topics::ALERT_ACKNOWLEDGED,
                                    alert_event_payload(&updated, now),
                                );
                                acknowledged.push(updated);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::error!(alert_id = %id, error = %e, "Bulk acknowledge read-back failed");
                            }
                        },
                        Ok(false) => {
                            tracing::debug!(alert_id = %id, "Skipped: left OPEN concurrently");
                        }
                        Err(e) => {
                            tracing::error!(alert_id = %id, error = %e, "Bulk acknowledge failed for alert");
                        }
                    }
                }
                Ok(Some(alert)) => {
                    tracing::debug!(alert_id = %id, status = %alert.status, "Skipped: not open");
                }
                Ok(None) => {
                    tracing::debug!(alert_id = %id, "Skipped: unknown alert id");
                }
                Err(e) => {
                    tracing::error!(alert_id = %id, error = %e, "Bulk acknowledge lookup failed");
                }
            }
        }
        acknowledged
    }

    pub fn get(&self, id: &str) -> Result<Alert> {
        self.store
            .get_alert(id)?
            .ok_or_else(|| AlertError::NotFound { id: id.to_string() })
    }

    pub fn list(&self, filter: &AlertFilter, limit: usize, offset: usize) -> Result<Vec<Alert>> {
        Ok(self.store.query_alerts(filter, limit, offset)?)
    }

    pub fn count(&self, filter: &AlertFilter) -> Result<u64> {
        Ok(self.store.count_alerts(filter)?)
    }

    pub fn correlated(&self, correlation_id: &str) -> Result<Vec<Alert>> {
        Ok(self.store.query_by_correlation_id(correlation_id)?)
    }

    pub fn stats(&self) -> Result<AlertStats> {
        Ok(self.store.stats(Utc::now())?)
    }
}

fn build_alert(
    request: &CreateAlertRequest,
    resource_ref: Option<String>,
    fingerprint: String,
    now: DateTime<Utc>,
) -> Alert {
    Alert {
        id: siren_common::id::next_id(),
        title: request.title.clone(),
        description: request.description.clone(),
        severity: request.severity,
        status: AlertStatus::Open,
        category: request.category,
        source: request.source.clone(),
        resource_ref,
        correlation_id: None,
        rule_id: request.rule_id.clone(),
        fingerprint,
        tags: request.tags.clone(),
        metadata: request.metadata.clone(),
        metric_value: request.metric_value,
        threshold_value: request.threshold_value,
        occurrence_count: 1,
        first_occurrence: now,
        last_occurrence: now,
        created_at: now,
        updated_at: now,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        resolution_notes: None,
        escalation_level: 0,
        next_escalation_at: Some(now + lifecycle::initial_escalation_interval()),
        auto_resolved: false,
    }
}
