mod common;

use axum::http::StatusCode;
use common::{
    alert_payload, assert_err_envelope, assert_ok_envelope, build_test_context, request_json,
    request_no_body,
};
use serde_json::json;

#[tokio::test]
async fn health_returns_ok_envelope() {
    let ctx = build_test_context().expect("test context should build");
    let (status, body, trace) = request_no_body(&ctx.app, "GET", "/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert!(body["data"]["version"].is_string());
    assert_eq!(body["data"]["storage_status"], "ok");
    assert!(trace.is_some());
}

#[tokio::test]
async fn submit_then_get_and_list() {
    let ctx = build_test_context().expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts",
        Some(alert_payload("CPU high", "high")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    let id = body["data"]["id"].as_str().expect("alert id").to_string();
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["occurrence_count"], 1);

    let (status, body, _) = request_no_body(&ctx.app, "GET", &format!("/v1/alerts/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/alerts?active=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], id.as_str());
}

#[tokio::test]
async fn duplicate_submission_merges() {
    let ctx = build_test_context().expect("test context should build");

    let payload = alert_payload("Disk full", "medium");
    let (_, first, _) = request_json(&ctx.app, "POST", "/v1/alerts", Some(payload.clone())).await;
    let (status, second, _) = request_json(&ctx.app, "POST", "/v1/alerts", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["data"]["id"], first["data"]["id"]);
    assert_eq!(second["data"]["occurrence_count"], 2);
}

#[tokio::test]
async fn acknowledge_and_resolve_lifecycle() {
    let ctx = build_test_context().expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts",
        Some(alert_payload("Mem high", "high")),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/alerts/{id}/acknowledge"),
        Some(json!({"actor": "alice", "notes": "on it"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "acknowledged");
    assert_eq!(body["data"]["acknowledged_by"], "alice");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/alerts/{id}/resolve"),
        Some(json!({"actor": "alice", "notes": "restarted"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "resolved");
    assert_eq!(body["data"]["resolution_notes"], "restarted");

    // Terminal: a second resolve is rejected.
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/alerts/{id}/resolve"),
        Some(json!({"actor": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1101);
}

#[tokio::test]
async fn unknown_alert_returns_not_found() {
    let ctx = build_test_context().expect("test context should build");
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/alerts/999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn invalid_severity_filter_is_rejected() {
    let ctx = build_test_context().expect("test context should build");
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/alerts?severity__eq=apocalyptic").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
}

#[tokio::test]
async fn bulk_acknowledge_skips_non_open() {
    let ctx = build_test_context().expect("test context should build");

    let (_, open, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts",
        Some(alert_payload("Open one", "medium")),
    )
    .await;
    let open_id = open["data"]["id"].as_str().unwrap().to_string();

    let (_, resolved, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts",
        Some(alert_payload("Resolved one", "medium")),
    )
    .await;
    let resolved_id = resolved["data"]["id"].as_str().unwrap().to_string();
    request_json(
        &ctx.app,
        "POST",
        &format!("/v1/alerts/{resolved_id}/resolve"),
        Some(json!({"actor": "ops"})),
    )
    .await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts/bulk-acknowledge",
        Some(json!({
            "ids": [open_id, resolved_id, "missing"],
            "actor": "ops"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    let items = body["data"].as_array().expect("array of acknowledged");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], open["data"]["id"]);
}

#[tokio::test]
async fn rule_suppression_covers_new_arrivals() {
    let ctx = build_test_context().expect("test context should build");

    let (status, rule, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(json!({"name": "Noisy rule", "category": "system", "severity": "medium"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let rule_id = rule["data"]["id"].as_str().unwrap().to_string();

    let mut payload = alert_payload("Noisy", "medium");
    payload["rule_id"] = json!(rule_id);
    let (_, first, _) = request_json(&ctx.app, "POST", "/v1/alerts", Some(payload.clone())).await;
    assert_eq!(first["data"]["status"], "open");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts/suppress",
        Some(json!({"rule_id": rule_id, "duration_minutes": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "suppressed");

    // New arrival for the suppressed rule lands directly in SUPPRESSED.
    let (_, arrival, _) = request_json(&ctx.app, "POST", "/v1/alerts", Some(payload)).await;
    assert_eq!(arrival["data"]["status"], "suppressed");

    let (_, rules, _) = request_no_body(&ctx.app, "GET", "/v1/rules").await;
    assert!(rules["data"][0]["suppressed_until"].is_string());
}

#[tokio::test]
async fn stats_reflect_submissions() {
    let ctx = build_test_context().expect("test context should build");

    request_json(
        &ctx.app,
        "POST",
        "/v1/alerts",
        Some(alert_payload("A", "critical")),
    )
    .await;
    request_json(
        &ctx.app,
        "POST",
        "/v1/alerts",
        Some(alert_payload("B", "low")),
    )
    .await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/alerts/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["open"], 2);
    assert_eq!(body["data"]["critical_open"], 1);
}
