use chrono::{DateTime, Duration, NaiveTime, Utc};
use rusqlite::Connection;
use siren_common::types::{Alert, AlertCategory, AlertStats, AlertStatus, Severity};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::{AlertFilter, AlertStore, RuleRow, UpsertOutcome};

/// How often the upsert retries the update arm after losing an insert race.
const UPSERT_RETRIES: usize = 3;

const ALERT_COLUMNS: &str = "id, title, description, severity, status, category, source, \
     resource_ref, correlation_id, rule_id, fingerprint, tags, metadata, \
     metric_value, threshold_value, occurrence_count, first_occurrence, last_occurrence, \
     created_at, updated_at, acknowledged_at, acknowledged_by, resolved_at, resolved_by, \
     resolution_notes, escalation_level, next_escalation_at, auto_resolved";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alerts (
    id                 TEXT PRIMARY KEY,
    title              TEXT NOT NULL,
    description        TEXT NOT NULL,
    severity           TEXT NOT NULL,
    status             TEXT NOT NULL,
    category           TEXT NOT NULL,
    source             TEXT NOT NULL,
    resource_ref       TEXT,
    correlation_id     TEXT,
    rule_id            TEXT,
    fingerprint        TEXT NOT NULL,
    tags               TEXT NOT NULL DEFAULT '{}',
    metadata           TEXT NOT NULL DEFAULT '{}',
    metric_value       REAL,
    threshold_value    REAL,
    occurrence_count   INTEGER NOT NULL DEFAULT 1,
    first_occurrence   INTEGER NOT NULL,
    last_occurrence    INTEGER NOT NULL,
    created_at         INTEGER NOT NULL,
    updated_at         INTEGER NOT NULL,
    acknowledged_at    INTEGER,
    acknowledged_by    TEXT,
    resolved_at        INTEGER,
    resolved_by        TEXT,
    resolution_notes   TEXT,
    escalation_level   INTEGER NOT NULL DEFAULT 0,
    next_escalation_at INTEGER,
    auto_resolved      INTEGER NOT NULL DEFAULT 0
);

-- Invariant: at most one active alert per fingerprint. The partial index
-- makes the constraint a storage-level guarantee rather than a read-then-
-- write convention.
CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_active_fingerprint
    ON alerts(fingerprint) WHERE status IN ('open', 'acknowledged');

CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
CREATE INDEX IF NOT EXISTS idx_alerts_severity ON alerts(severity);
CREATE INDEX IF NOT EXISTS idx_alerts_resource ON alerts(resource_ref);
CREATE INDEX IF NOT EXISTS idx_alerts_correlation ON alerts(correlation_id);
CREATE INDEX IF NOT EXISTS idx_alerts_rule ON alerts(rule_id);
CREATE INDEX IF NOT EXISTS idx_alerts_next_escalation ON alerts(next_escalation_at);

CREATE TABLE IF NOT EXISTS alert_rules (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL UNIQUE,
    category         TEXT NOT NULL,
    severity         TEXT NOT NULL,
    enabled          INTEGER NOT NULL DEFAULT 1,
    suppressed_until INTEGER,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);
";

pub struct SqliteAlertStore {
    conn: Mutex<Connection>,
}

impl SqliteAlertStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_ms(v: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(v).unwrap_or_default()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
    let severity: String = row.get(3)?;
    let status: String = row.get(4)?;
    let category: String = row.get(5)?;
    let tags: String = row.get(11)?;
    let metadata: String = row.get(12)?;

    Ok(Alert {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        severity: severity.parse().unwrap_or(Severity::Low),
        status: status.parse().unwrap_or(AlertStatus::Open),
        category: category.parse().unwrap_or(AlertCategory::System),
        source: row.get(6)?,
        resource_ref: row.get(7)?,
        correlation_id: row.get(8)?,
        rule_id: row.get(9)?,
        fingerprint: row.get(10)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        metric_value: row.get(13)?,
        threshold_value: row.get(14)?,
        occurrence_count: row.get(15)?,
        first_occurrence: from_ms(row.get(16)?),
        last_occurrence: from_ms(row.get(17)?),
        created_at: from_ms(row.get(18)?),
        updated_at: from_ms(row.get(19)?),
        acknowledged_at: row.get::<_, Option<i64>>(20)?.map(from_ms),
        acknowledged_by: row.get(21)?,
        resolved_at: row.get::<_, Option<i64>>(22)?.map(from_ms),
        resolved_by: row.get(23)?,
        resolution_notes: row.get(24)?,
        escalation_level: row.get(25)?,
        next_escalation_at: row.get::<_, Option<i64>>(26)?.map(from_ms),
        auto_resolved: row.get(27)?,
    })
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleRow> {
    let category: String = row.get(2)?;
    let severity: String = row.get(3)?;
    Ok(RuleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        category: category.parse().unwrap_or(AlertCategory::System),
        severity: severity.parse().unwrap_or(Severity::Low),
        enabled: row.get(4)?,
        suppressed_until: row.get::<_, Option<i64>>(5)?.map(from_ms),
        created_at: from_ms(row.get(6)?),
        updated_at: from_ms(row.get(7)?),
    })
}

fn insert_alert_stmt(conn: &Connection, alert: &Alert) -> Result<()> {
    let tags = serde_json::to_string(&alert.tags)?;
    let metadata = serde_json::to_string(&alert.metadata)?;
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT INTO alerts ({ALERT_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
          ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"
    ))?;
    stmt.execute(rusqlite::params![
        alert.id,
        alert.title,
        alert.description,
        alert.severity.to_string(),
        alert.status.to_string(),
        alert.category.to_string(),
        alert.source,
        alert.resource_ref,
        alert.correlation_id,
        alert.rule_id,
        alert.fingerprint,
        tags,
        metadata,
        alert.metric_value,
        alert.threshold_value,
        alert.occurrence_count,
        ms(alert.first_occurrence),
        ms(alert.last_occurrence),
        ms(alert.created_at),
        ms(alert.updated_at),
        alert.acknowledged_at.map(ms),
        alert.acknowledged_by,
        alert.resolved_at.map(ms),
        alert.resolved_by,
        alert.resolution_notes,
        alert.escalation_level,
        alert.next_escalation_at.map(ms),
        alert.auto_resolved,
    ])?;
    Ok(())
}

fn select_active_by_fingerprint(conn: &Connection, fingerprint: &str) -> Result<Option<Alert>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ALERT_COLUMNS} FROM alerts \
         WHERE fingerprint = ?1 AND status IN ('open', 'acknowledged')"
    ))?;
    let mut rows = stmt.query_map(rusqlite::params![fingerprint], row_to_alert)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

impl AlertStore for SqliteAlertStore {
    fn upsert_by_fingerprint(&self, candidate: &Alert) -> Result<UpsertOutcome> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        for _ in 0..UPSERT_RETRIES {
            let updated = tx.execute(
                "UPDATE alerts SET \
                     occurrence_count = occurrence_count + 1, \
                     last_occurrence = ?1, \
                     description = ?2, \
                     metric_value = ?3, \
                     updated_at = ?1 \
                 WHERE fingerprint = ?4 AND status IN ('open', 'acknowledged')",
                rusqlite::params![
                    ms(candidate.last_occurrence),
                    candidate.description,
                    candidate.metric_value,
                    candidate.fingerprint,
                ],
            )?;

            if updated > 0 {
                let alert = select_active_by_fingerprint(&tx, &candidate.fingerprint)?
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "alert",
                        id: candidate.fingerprint.clone(),
                    })?;
                tx.commit()?;
                return Ok(UpsertOutcome::Deduplicated(alert));
            }

            match insert_alert_stmt(&tx, candidate) {
                Ok(()) => {
                    tx.commit()?;
                    return Ok(UpsertOutcome::Created(candidate.clone()));
                }
                // Lost the race against a concurrent insert of the same
                // fingerprint: fall back to the update arm.
                Err(StoreError::Sqlite(e)) if is_unique_violation(&e) => {
                    tracing::warn!(
                        fingerprint = %candidate.fingerprint,
                        "Insert lost active-fingerprint race, retrying as update"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::FingerprintConflict {
            fingerprint: candidate.fingerprint.clone(),
        })
    }

    fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let conn = self.lock();
        insert_alert_stmt(&conn, alert)
    }

    fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"))?;
        let mut rows = stmt.query_map(rusqlite::params![id], row_to_alert)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn find_active_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Alert>> {
        let conn = self.lock();
        select_active_by_fingerprint(&conn, fingerprint)
    }

    fn mark_acknowledged(
        &self,
        id: &str,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let metadata: Option<String> = if let Some(notes) = notes {
            let current: Option<String> = tx
                .query_row(
                    "SELECT metadata FROM alerts WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )
                .map(Some)
                .unwrap_or(None);
            let mut map: HashMap<String, String> = current
                .as_deref()
                .and_then(|m| serde_json::from_str(m).ok())
                .unwrap_or_default();
            map.insert("acknowledgment_notes".to_string(), notes.to_string());
            Some(serde_json::to_string(&map)?)
        } else {
            None
        };

        let updated = match metadata {
            Some(metadata) => tx.execute(
                "UPDATE alerts SET status = 'acknowledged', acknowledged_at = ?1, \
                     acknowledged_by = ?2, metadata = ?3, updated_at = ?1 \
                 WHERE id = ?4 AND status = 'open'",
                rusqlite::params![ms(now), actor, metadata, id],
            )?,
            None => tx.execute(
                "UPDATE alerts SET status = 'acknowledged', acknowledged_at = ?1, \
                     acknowledged_by = ?2, updated_at = ?1 \
                 WHERE id = ?3 AND status = 'open'",
                rusqlite::params![ms(now), actor, id],
            )?,
        };

        tx.commit()?;
        Ok(updated > 0)
    }

    fn mark_resolved(
        &self,
        id: &str,
        actor: Option<&str>,
        notes: Option<&str>,
        auto: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE alerts SET status = 'resolved', resolved_at = ?1, resolved_by = ?2, \
                 resolution_notes = ?3, auto_resolved = ?4, next_escalation_at = NULL, \
                 updated_at = ?1 \
             WHERE id = ?5 AND status IN ('open', 'acknowledged')",
            rusqlite::params![ms(now), actor, notes, auto, id],
        )?;
        Ok(updated > 0)
    }

    fn mark_suppressed_by_rule(
        &self,
        rule_id: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut open: Vec<Alert> = {
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts \
                 WHERE rule_id = ?1 AND status = 'open' ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(rusqlite::params![rule_id], row_to_alert)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        for alert in &mut open {
            alert.status = AlertStatus::Suppressed;
            alert
                .metadata
                .insert("suppressed_until".to_string(), until.to_rfc3339());
            alert.next_escalation_at = None;
            alert.updated_at = now;
            let metadata = serde_json::to_string(&alert.metadata)?;
            tx.execute(
                "UPDATE alerts SET status = 'suppressed', metadata = ?1, \
                     next_escalation_at = NULL, updated_at = ?2 \
                 WHERE id = ?3 AND status = 'open'",
                rusqlite::params![metadata, ms(now), alert.id],
            )?;
        }

        tx.commit()?;
        Ok(open)
    }

    fn record_escalation(
        &self,
        id: &str,
        expected_level: i64,
        next_escalation_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock();
        // The level guard keeps a re-entrant sweep from double-escalating an
        // alert a completed prior iteration already advanced.
        let updated = conn.execute(
            "UPDATE alerts SET escalation_level = escalation_level + 1, \
                 next_escalation_at = ?1, updated_at = ?2 \
             WHERE id = ?3 AND status = 'open' AND escalation_level = ?4",
            rusqlite::params![ms(next_escalation_at), ms(now), id, expected_level],
        )?;
        Ok(updated > 0)
    }

    fn assign_correlation_id(
        &self,
        id: &str,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE alerts SET correlation_id = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![correlation_id, ms(now), id],
        )?;
        Ok(updated > 0)
    }

    fn find_correlation_candidates(
        &self,
        resource_ref: Option<&str>,
        category: AlertCategory,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let conn = self.lock();
        let sql = match resource_ref {
            Some(_) => format!(
                "SELECT {ALERT_COLUMNS} FROM alerts \
                 WHERE resource_ref = ?1 AND category = ?2 AND severity = ?3 \
                   AND created_at >= ?4 AND status IN ('open', 'acknowledged') \
                 ORDER BY created_at ASC"
            ),
            None => format!(
                "SELECT {ALERT_COLUMNS} FROM alerts \
                 WHERE resource_ref IS NULL AND category = ?1 AND severity = ?2 \
                   AND created_at >= ?3 AND status IN ('open', 'acknowledged') \
                 ORDER BY created_at ASC"
            ),
        };
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = match resource_ref {
            Some(r) => stmt.query_map(
                rusqlite::params![r, category.to_string(), severity.to_string(), ms(since)],
                row_to_alert,
            )?,
            None => stmt.query_map(
                rusqlite::params![category.to_string(), severity.to_string(), ms(since)],
                row_to_alert,
            )?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_by_correlation_id(&self, correlation_id: &str) -> Result<Vec<Alert>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE correlation_id = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(rusqlite::params![correlation_id], row_to_alert)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_due_for_escalation(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Alert>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE status = 'open' AND next_escalation_at IS NOT NULL \
               AND next_escalation_at <= ?1 \
             ORDER BY next_escalation_at ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![ms(now), limit as i64], row_to_alert)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_stale_active(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<Alert>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE status IN ('open', 'acknowledged') \
               AND COALESCE(last_occurrence, created_at) < ?1 \
             ORDER BY last_occurrence ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![ms(cutoff), limit as i64], row_to_alert)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_alerts(
        &self,
        filter: &AlertFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Alert>> {
        let conn = self.lock();
        let (where_sql, params) = build_filter(filter);
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts{where_sql} \
             ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            params.len() + 1,
            params.len() + 2
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let limit = limit as i64;
        let offset = offset as i64;
        param_refs.push(&limit);
        param_refs.push(&offset);
        let rows = stmt.query_map(param_refs.as_slice(), row_to_alert)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_alerts(&self, filter: &AlertFilter) -> Result<u64> {
        let conn = self.lock();
        let (where_sql, params) = build_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM alerts{where_sql}");
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = stmt.query_row(param_refs.as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn stats(&self, now: DateTime<Utc>) -> Result<AlertStats> {
        let conn = self.lock();
        let count = |sql: &str, params: &[&dyn rusqlite::types::ToSql]| -> Result<u64> {
            let mut stmt = conn.prepare_cached(sql)?;
            let c: i64 = stmt.query_row(params, |row| row.get(0))?;
            Ok(c as u64)
        };

        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let since = now - Duration::hours(24);

        let total = count("SELECT COUNT(*) FROM alerts", &[])?;
        let open = count("SELECT COUNT(*) FROM alerts WHERE status = 'open'", &[])?;
        let acknowledged = count(
            "SELECT COUNT(*) FROM alerts WHERE status = 'acknowledged'",
            &[],
        )?;
        let critical_open = count(
            "SELECT COUNT(*) FROM alerts WHERE severity = 'critical' AND status = 'open'",
            &[],
        )?;
        let resolved_today = count(
            "SELECT COUNT(*) FROM alerts WHERE resolved_at IS NOT NULL AND resolved_at >= ?1",
            &[&ms(day_start)],
        )?;

        let grouped = |column: &str| -> Result<HashMap<String, u64>> {
            let sql = format!(
                "SELECT {column}, COUNT(*) FROM alerts WHERE created_at >= ?1 GROUP BY {column}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![ms(since)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (key, count) = row?;
                map.insert(key, count as u64);
            }
            Ok(map)
        };

        Ok(AlertStats {
            total,
            open,
            acknowledged,
            critical_open,
            resolved_today,
            by_severity: grouped("severity")?,
            by_category: grouped("category")?,
        })
    }

    fn insert_rule(&self, rule: &RuleRow) -> Result<RuleRow> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO alert_rules \
                 (id, name, category, severity, enabled, suppressed_until, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                rule.id,
                rule.name,
                rule.category.to_string(),
                rule.severity.to_string(),
                rule.enabled,
                rule.suppressed_until.map(ms),
                ms(rule.created_at),
                ms(rule.updated_at),
            ],
        )?;
        Ok(rule.clone())
    }

    fn get_rule(&self, id: &str) -> Result<Option<RuleRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, category, severity, enabled, suppressed_until, created_at, updated_at \
             FROM alert_rules WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], row_to_rule)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_rules(&self, enabled_only: bool) -> Result<Vec<RuleRow>> {
        let conn = self.lock();
        let sql = if enabled_only {
            "SELECT id, name, category, severity, enabled, suppressed_until, created_at, updated_at \
             FROM alert_rules WHERE enabled = 1 ORDER BY created_at ASC"
        } else {
            "SELECT id, name, category, severity, enabled, suppressed_until, created_at, updated_at \
             FROM alert_rules ORDER BY created_at ASC"
        };
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map([], row_to_rule)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_rule_suppressed_until(
        &self,
        rule_id: &str,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE alert_rules SET suppressed_until = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![ms(until), ms(now), rule_id],
        )?;
        Ok(updated > 0)
    }
}

fn build_filter(filter: &AlertFilter) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = filter.status_eq {
        params.push(Box::new(status.to_string()));
        clauses.push(format!("status = ?{}", params.len()));
    }
    if let Some(severity) = filter.severity_eq {
        params.push(Box::new(severity.to_string()));
        clauses.push(format!("severity = ?{}", params.len()));
    }
    if let Some(category) = filter.category_eq {
        params.push(Box::new(category.to_string()));
        clauses.push(format!("category = ?{}", params.len()));
    }
    if let Some(resource) = &filter.resource_ref_eq {
        params.push(Box::new(resource.clone()));
        clauses.push(format!("resource_ref = ?{}", params.len()));
    }
    if let Some(rule_id) = &filter.rule_id_eq {
        params.push(Box::new(rule_id.clone()));
        clauses.push(format!("rule_id = ?{}", params.len()));
    }
    if filter.active_only {
        clauses.push("status IN ('open', 'acknowledged')".to_string());
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}
