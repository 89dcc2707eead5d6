#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use siren_engine::bus::{BroadcastBus, EventBus};
use siren_engine::correlation::CorrelationWorker;
use siren_engine::rules::RuleCache;
use siren_engine::service::{AlertService, PassthroughDirectory};
use siren_notify::manager::NotificationManager;
use siren_server::app;
use siren_server::config::ServerConfig;
use siren_server::state::AppState;
use siren_storage::sqlite::SqliteAlertStore;
use siren_storage::AlertStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context() -> Result<TestContext> {
    siren_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::open(
        &temp_dir.path().join("siren.db"),
    )?);

    let bus = Arc::new(BroadcastBus::default());
    let bus_dyn: Arc<dyn EventBus> = bus;
    let notifier = Arc::new(NotificationManager::new(vec![]));
    let rules = Arc::new(RuleCache::new(store.clone(), 30));

    let (worker, correlation_tx) = CorrelationWorker::new(store.clone(), bus_dyn.clone(), 300, 64);
    tokio::spawn(worker.run());

    let service = Arc::new(AlertService::new(
        store.clone(),
        notifier,
        bus_dyn,
        Arc::new(PassthroughDirectory),
        rules.clone(),
        correlation_tx,
        Duration::from_secs(1),
    ));

    let state = AppState {
        service,
        store,
        rules,
        start_time: Utc::now(),
        config: Arc::new(ServerConfig::default()),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["err_code"], 0, "expected ok envelope, got: {body}");
    assert_eq!(body["err_msg"], "success");
}

pub fn assert_err_envelope(body: &Value, err_code: i64) {
    assert_eq!(
        body["err_code"], err_code,
        "expected err_code {err_code}, got: {body}"
    );
}

pub fn alert_payload(title: &str, severity: &str) -> Value {
    serde_json::json!({
        "title": title,
        "description": format!("{title} description"),
        "severity": severity,
        "category": "system",
        "source": "integration-test",
        "resource_ref": "srv-01",
        "metric_value": 97.5,
        "threshold_value": 90.0
    })
}
