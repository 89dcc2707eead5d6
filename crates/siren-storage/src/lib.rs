//! Durable storage for alerts and alert rules.
//!
//! The default implementation ([`sqlite::SqliteAlertStore`]) uses a single
//! SQLite database in WAL mode. The at-most-one-active-alert-per-fingerprint
//! invariant is enforced at the storage level with a partial unique index,
//! and [`AlertStore::upsert_by_fingerprint`] retries on conflict so that
//! concurrent submissions of the same fingerprint can never create two
//! active rows.

pub mod error;
pub mod sqlite;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siren_common::types::{Alert, AlertCategory, AlertStats, AlertStatus, Severity};

use crate::error::Result;

/// Outcome of an atomic find-or-create on the active-fingerprint constraint.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// No active alert carried the fingerprint; the candidate was inserted.
    Created(Alert),
    /// An active alert carried the fingerprint; its occurrence count,
    /// last occurrence, description and metric value were updated.
    Deduplicated(Alert),
}

impl UpsertOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            UpsertOutcome::Created(a) | UpsertOutcome::Deduplicated(a) => a,
        }
    }

    pub fn into_alert(self) -> Alert {
        match self {
            UpsertOutcome::Created(a) | UpsertOutcome::Deduplicated(a) => a,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Filter for alert list queries. All fields are conjunctive; `None` means
/// "don't care".
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status_eq: Option<AlertStatus>,
    pub severity_eq: Option<Severity>,
    pub category_eq: Option<AlertCategory>,
    pub resource_ref_eq: Option<String>,
    pub rule_id_eq: Option<String>,
    /// Restrict to status in {open, acknowledged}.
    pub active_only: bool,
}

/// Alert rule row (alert_rules table). Rules are referenced by alerts via
/// `rule_id` and carry the suppression window consulted by the rule cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRow {
    pub id: String,
    pub name: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub enabled: bool,
    /// End of the active suppression window, if one was requested.
    pub suppressed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence backend for alerts and rules.
///
/// Implementations must be safe to share across threads (`Send + Sync`):
/// the store is hit concurrently by the synchronous ingestion path, the
/// correlation worker and both periodic sweeps. Every mutation is a
/// single-row (or single-rule-scope) transaction; a partially applied
/// lifecycle transition is never observable.
pub trait AlertStore: Send + Sync {
    /// Atomically find-or-create on the active-fingerprint constraint.
    ///
    /// A dedup hit increments `occurrence_count`, sets `last_occurrence`,
    /// and overwrites `description` and `metric_value` with the candidate's
    /// values. A miss inserts the candidate as-is. An insert that loses a
    /// race against a concurrent insert of the same fingerprint retries the
    /// update arm.
    fn upsert_by_fingerprint(&self, candidate: &Alert) -> Result<UpsertOutcome>;

    /// Inserts an alert row without touching the dedup path. Used for
    /// suppressed-on-arrival alerts, which sit outside the active subset.
    fn insert_alert(&self, alert: &Alert) -> Result<()>;

    fn get_alert(&self, id: &str) -> Result<Option<Alert>>;

    fn find_active_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Alert>>;

    /// Marks an open alert acknowledged. Returns `false` when the alert was
    /// not in OPEN at commit time (the status guard is part of the UPDATE).
    fn mark_acknowledged(
        &self,
        id: &str,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Marks an active alert resolved, clearing `next_escalation_at`.
    /// Returns `false` when the alert was not in OPEN/ACKNOWLEDGED at
    /// commit time.
    fn mark_resolved(
        &self,
        id: &str,
        actor: Option<&str>,
        notes: Option<&str>,
        auto: bool,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Suppresses every OPEN alert attached to the rule, stamping
    /// `suppressed_until` into each alert's metadata. Returns the alerts
    /// that were transitioned.
    fn mark_suppressed_by_rule(
        &self,
        rule_id: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>>;

    /// Advances the escalation level and deadline in one transaction.
    /// `expected_level` is the level the caller observed; the update is a
    /// no-op (returns `false`) if another sweep already advanced it, which
    /// makes re-entrant sweeps idempotent.
    fn record_escalation(
        &self,
        id: &str,
        expected_level: i64,
        next_escalation_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    fn assign_correlation_id(
        &self,
        id: &str,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Active alerts in the same correlation scope: same resource (or both
    /// without one), category and severity, created at or after `since`.
    /// Ordered by creation time ascending.
    fn find_correlation_candidates(
        &self,
        resource_ref: Option<&str>,
        category: AlertCategory,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>>;

    fn query_by_correlation_id(&self, correlation_id: &str) -> Result<Vec<Alert>>;

    /// OPEN alerts whose escalation deadline has passed, oldest deadline
    /// first.
    fn query_due_for_escalation(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Alert>>;

    /// Active alerts whose last occurrence is older than `cutoff`.
    fn query_stale_active(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<Alert>>;

    fn query_alerts(&self, filter: &AlertFilter, limit: usize, offset: usize)
        -> Result<Vec<Alert>>;

    fn count_alerts(&self, filter: &AlertFilter) -> Result<u64>;

    fn stats(&self, now: DateTime<Utc>) -> Result<AlertStats>;

    // ---- Rules ----

    fn insert_rule(&self, rule: &RuleRow) -> Result<RuleRow>;

    fn get_rule(&self, id: &str) -> Result<Option<RuleRow>>;

    fn list_rules(&self, enabled_only: bool) -> Result<Vec<RuleRow>>;

    /// Stamps the rule's suppression window. Returns `false` if the rule is
    /// unknown.
    fn set_rule_suppressed_until(
        &self,
        rule_id: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}
