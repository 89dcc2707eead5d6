use crate::sqlite::SqliteAlertStore;
use crate::{AlertFilter, AlertStore, RuleRow, UpsertOutcome};
use chrono::{Duration, Utc};
use siren_common::types::{Alert, AlertCategory, AlertStatus, Severity};
use std::collections::HashMap;
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteAlertStore) {
    siren_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let store = SqliteAlertStore::open(&dir.path().join("siren.db")).unwrap();
    (dir, store)
}

fn make_alert(title: &str, severity: Severity, fingerprint: &str) -> Alert {
    let now = Utc::now();
    Alert {
        id: siren_common::id::next_id(),
        title: title.to_string(),
        description: format!("{title} description"),
        severity,
        status: AlertStatus::Open,
        category: AlertCategory::System,
        source: "health-check".to_string(),
        resource_ref: Some("srv-01".to_string()),
        correlation_id: None,
        rule_id: None,
        fingerprint: fingerprint.to_string(),
        tags: HashMap::new(),
        metadata: HashMap::new(),
        metric_value: Some(97.0),
        threshold_value: Some(90.0),
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
        next_escalation_at: Some(now + Duration::minutes(15)),
        auto_resolved: false,
    }
}

#[test]
fn upsert_creates_then_deduplicates() {
    let (_dir, store) = setup();

    let first = make_alert("CPU high", Severity::High, "fp-1");
    let outcome = store.upsert_by_fingerprint(&first).unwrap();
    assert!(outcome.is_created());

    let mut second = make_alert("CPU high", Severity::High, "fp-1");
    second.description = "still climbing".to_string();
    second.metric_value = Some(99.0);
    let outcome = store.upsert_by_fingerprint(&second).unwrap();
    match outcome {
        UpsertOutcome::Deduplicated(alert) => {
            assert_eq!(alert.id, first.id);
            assert_eq!(alert.occurrence_count, 2);
            assert_eq!(alert.description, "still climbing");
            assert_eq!(alert.metric_value, Some(99.0));
        }
        UpsertOutcome::Created(_) => panic!("expected dedup hit"),
    }

    let filter = AlertFilter {
        active_only: true,
        ..Default::default()
    };
    assert_eq!(store.count_alerts(&filter).unwrap(), 1);

    let active = store.find_active_by_fingerprint("fp-1").unwrap().unwrap();
    assert_eq!(active.id, first.id);
}

#[test]
fn dedup_hits_acknowledged_alerts_too() {
    let (_dir, store) = setup();

    let first = make_alert("Disk full", Severity::Medium, "fp-2");
    store.upsert_by_fingerprint(&first).unwrap();
    assert!(store
        .mark_acknowledged(&first.id, "ops", None, Utc::now())
        .unwrap());

    let second = make_alert("Disk full", Severity::Medium, "fp-2");
    let outcome = store.upsert_by_fingerprint(&second).unwrap();
    assert!(!outcome.is_created());
    assert_eq!(outcome.alert().status, AlertStatus::Acknowledged);
}

#[test]
fn resolved_fingerprint_allows_new_alert() {
    let (_dir, store) = setup();

    let first = make_alert("Link flap", Severity::Low, "fp-3");
    store.upsert_by_fingerprint(&first).unwrap();
    assert!(store
        .mark_resolved(&first.id, Some("ops"), Some("fixed"), false, Utc::now())
        .unwrap());

    assert!(store.find_active_by_fingerprint("fp-3").unwrap().is_none());

    let second = make_alert("Link flap", Severity::Low, "fp-3");
    let outcome = store.upsert_by_fingerprint(&second).unwrap();
    assert!(outcome.is_created());
    assert_eq!(store.count_alerts(&AlertFilter::default()).unwrap(), 2);
}

#[test]
fn acknowledge_guard_rejects_non_open() {
    let (_dir, store) = setup();

    let alert = make_alert("Mem high", Severity::High, "fp-4");
    store.upsert_by_fingerprint(&alert).unwrap();
    store
        .mark_resolved(&alert.id, Some("ops"), None, false, Utc::now())
        .unwrap();

    assert!(!store
        .mark_acknowledged(&alert.id, "ops", Some("late"), Utc::now())
        .unwrap());
    let stored = store.get_alert(&alert.id).unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Resolved);
    assert!(stored.acknowledged_at.is_none());
}

#[test]
fn acknowledge_appends_notes_to_metadata() {
    let (_dir, store) = setup();

    let alert = make_alert("Mem high", Severity::High, "fp-5");
    store.upsert_by_fingerprint(&alert).unwrap();
    assert!(store
        .mark_acknowledged(&alert.id, "alice", Some("on it"), Utc::now())
        .unwrap());

    let stored = store.get_alert(&alert.id).unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Acknowledged);
    assert_eq!(stored.acknowledged_by.as_deref(), Some("alice"));
    assert_eq!(
        stored.metadata.get("acknowledgment_notes").map(String::as_str),
        Some("on it")
    );
}

#[test]
fn resolve_clears_next_escalation() {
    let (_dir, store) = setup();

    let alert = make_alert("Proc down", Severity::Critical, "fp-6");
    store.upsert_by_fingerprint(&alert).unwrap();
    store
        .mark_resolved(&alert.id, Some("bob"), Some("restarted"), false, Utc::now())
        .unwrap();

    let stored = store.get_alert(&alert.id).unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Resolved);
    assert!(stored.next_escalation_at.is_none());
    assert_eq!(stored.resolved_by.as_deref(), Some("bob"));
    assert_eq!(stored.resolution_notes.as_deref(), Some("restarted"));
    assert!(!stored.auto_resolved);
}

#[test]
fn suppress_by_rule_only_touches_open() {
    let (_dir, store) = setup();

    let mut a = make_alert("Rule alert A", Severity::Medium, "fp-7a");
    a.rule_id = Some("rule-9".to_string());
    let mut b = make_alert("Rule alert B", Severity::Medium, "fp-7b");
    b.rule_id = Some("rule-9".to_string());
    let mut c = make_alert("Rule alert C", Severity::Medium, "fp-7c");
    c.rule_id = Some("rule-9".to_string());
    store.upsert_by_fingerprint(&a).unwrap();
    store.upsert_by_fingerprint(&b).unwrap();
    store.upsert_by_fingerprint(&c).unwrap();
    store
        .mark_acknowledged(&c.id, "ops", None, Utc::now())
        .unwrap();

    let until = Utc::now() + Duration::minutes(30);
    let suppressed = store
        .mark_suppressed_by_rule("rule-9", until, Utc::now())
        .unwrap();
    assert_eq!(suppressed.len(), 2);
    for alert in &suppressed {
        assert_eq!(alert.status, AlertStatus::Suppressed);
        assert!(alert.metadata.contains_key("suppressed_until"));
    }

    // The acknowledged alert is left alone.
    let stored_c = store.get_alert(&c.id).unwrap().unwrap();
    assert_eq!(stored_c.status, AlertStatus::Acknowledged);
}

#[test]
fn escalation_level_guard_is_idempotent() {
    let (_dir, store) = setup();

    let alert = make_alert("Svc degraded", Severity::High, "fp-8");
    store.upsert_by_fingerprint(&alert).unwrap();

    let next = Utc::now() + Duration::minutes(15);
    assert!(store
        .record_escalation(&alert.id, 0, next, Utc::now())
        .unwrap());
    // Replaying the same observation must be a no-op.
    assert!(!store
        .record_escalation(&alert.id, 0, next, Utc::now())
        .unwrap());

    let stored = store.get_alert(&alert.id).unwrap().unwrap();
    assert_eq!(stored.escalation_level, 1);
}

#[test]
fn due_and_stale_queries() {
    let (_dir, store) = setup();
    let now = Utc::now();

    let mut due = make_alert("Due", Severity::High, "fp-9a");
    due.next_escalation_at = Some(now - Duration::minutes(1));
    let mut not_due = make_alert("Not due", Severity::High, "fp-9b");
    not_due.next_escalation_at = Some(now + Duration::minutes(10));
    store.upsert_by_fingerprint(&due).unwrap();
    store.upsert_by_fingerprint(&not_due).unwrap();

    let found = store.query_due_for_escalation(now, 100).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, due.id);

    let mut stale = make_alert("Stale", Severity::Low, "fp-9c");
    stale.last_occurrence = now - Duration::hours(24) - Duration::seconds(1);
    store.upsert_by_fingerprint(&stale).unwrap();
    let mut fresh = make_alert("Fresh", Severity::Low, "fp-9d");
    fresh.last_occurrence = now - Duration::hours(23) - Duration::minutes(59);
    store.upsert_by_fingerprint(&fresh).unwrap();

    let cutoff = now - Duration::hours(24);
    let found = store.query_stale_active(cutoff, 100).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, stale.id);
}

#[test]
fn correlation_candidates_scope() {
    let (_dir, store) = setup();

    let mut a = make_alert("A", Severity::High, "fp-10a");
    a.resource_ref = Some("srv-2".to_string());
    let mut b = make_alert("B", Severity::High, "fp-10b");
    b.resource_ref = Some("srv-2".to_string());
    let mut other_sev = make_alert("C", Severity::Low, "fp-10c");
    other_sev.resource_ref = Some("srv-2".to_string());
    let mut no_resource = make_alert("D", Severity::High, "fp-10d");
    no_resource.resource_ref = None;
    store.upsert_by_fingerprint(&a).unwrap();
    store.upsert_by_fingerprint(&b).unwrap();
    store.upsert_by_fingerprint(&other_sev).unwrap();
    store.upsert_by_fingerprint(&no_resource).unwrap();

    let since = Utc::now() - Duration::minutes(5);
    let found = store
        .find_correlation_candidates(Some("srv-2"), AlertCategory::System, Severity::High, since)
        .unwrap();
    assert_eq!(found.len(), 2);

    let found = store
        .find_correlation_candidates(None, AlertCategory::System, Severity::High, since)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, no_resource.id);
}

#[test]
fn stats_counts() {
    let (_dir, store) = setup();

    let open = make_alert("Open", Severity::Critical, "fp-11a");
    let acked = make_alert("Acked", Severity::Medium, "fp-11b");
    let resolved = make_alert("Resolved", Severity::Low, "fp-11c");
    store.upsert_by_fingerprint(&open).unwrap();
    store.upsert_by_fingerprint(&acked).unwrap();
    store.upsert_by_fingerprint(&resolved).unwrap();
    store
        .mark_acknowledged(&acked.id, "ops", None, Utc::now())
        .unwrap();
    store
        .mark_resolved(&resolved.id, Some("ops"), None, false, Utc::now())
        .unwrap();

    let stats = store.stats(Utc::now()).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.open, 1);
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.critical_open, 1);
    assert_eq!(stats.resolved_today, 1);
    assert_eq!(stats.by_severity.get("critical"), Some(&1));
}

#[test]
fn rule_roundtrip_and_suppression_window() {
    let (_dir, store) = setup();
    let now = Utc::now();

    let rule = RuleRow {
        id: "rule-1".to_string(),
        name: "High CPU".to_string(),
        category: AlertCategory::Performance,
        severity: Severity::High,
        enabled: true,
        suppressed_until: None,
        created_at: now,
        updated_at: now,
    };
    store.insert_rule(&rule).unwrap();

    let fetched = store.get_rule("rule-1").unwrap().unwrap();
    assert_eq!(fetched.name, "High CPU");
    assert!(fetched.suppressed_until.is_none());

    let until = now + Duration::minutes(60);
    assert!(store.set_rule_suppressed_until("rule-1", until, now).unwrap());
    let fetched = store.get_rule("rule-1").unwrap().unwrap();
    let stored_until = fetched.suppressed_until.unwrap();
    assert!((stored_until - until).num_seconds().abs() < 1);

    assert!(!store
        .set_rule_suppressed_until("missing", until, now)
        .unwrap());
    assert_eq!(store.list_rules(true).unwrap().len(), 1);
}
