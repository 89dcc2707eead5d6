use anyhow::Result;
use chrono::Utc;
use siren_common::types::Severity;
use siren_engine::autoresolve::AutoResolveSweeper;
use siren_engine::bus::{BroadcastBus, EventBus};
use siren_engine::correlation::CorrelationWorker;
use siren_engine::escalation::EscalationSweeper;
use siren_engine::rules::RuleCache;
use siren_engine::service::{AlertService, PassthroughDirectory};
use siren_notify::manager::{ChannelRoute, NotificationManager};
use siren_notify::webhook::WebhookNotifier;
use siren_storage::sqlite::SqliteAlertStore;
use siren_storage::AlertStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use siren_server::app;
use siren_server::config::ServerConfig;
use siren_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    siren_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("siren=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/server.toml");
    let config = if Path::new(config_path).exists() {
        ServerConfig::load(config_path)?
    } else {
        tracing::info!(path = %config_path, "No config file found, using defaults");
        ServerConfig::default()
    };

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        "siren-server starting"
    );

    std::fs::create_dir_all(&config.data_dir)?;
    let store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::open(
        &Path::new(&config.data_dir).join("siren.db"),
    )?);

    let bus = Arc::new(BroadcastBus::default());
    let bus_dyn: Arc<dyn EventBus> = bus.clone();

    // Debug tap: trace every published engine event.
    let mut bus_rx = bus.subscribe();
    let bus_tap_handle = tokio::spawn(async move {
        loop {
            match bus_rx.recv().await {
                Ok(event) => {
                    tracing::debug!(topic = event.topic, payload = %event.payload, "bus event");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Bus tap lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Notification routing: a single webhook channel when configured.
    let mut routes = Vec::new();
    if let Some(url) = config
        .notify
        .webhook_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
    {
        let min_severity: Severity = config
            .notify
            .min_severity
            .parse()
            .unwrap_or(Severity::High);
        match WebhookNotifier::new(url, config.notify.timeout_secs) {
            Ok(channel) => routes.push(ChannelRoute {
                min_severity,
                channel: Box::new(channel),
            }),
            Err(e) => tracing::error!(error = %e, "Failed to build webhook channel"),
        }
    }
    if routes.is_empty() {
        tracing::info!("No notification channels configured");
    }
    let notifier = Arc::new(NotificationManager::new(routes));

    // Rule cache: load once at startup, refresh periodically.
    let rules = Arc::new(RuleCache::new(store.clone(), config.rules.refresh_secs));
    if let Err(e) = rules.refresh() {
        tracing::error!(error = %e, "Initial rule cache load failed");
    }
    let rule_refresh_handle = tokio::spawn(rules.clone().run_refresh_loop());

    // Correlation worker: single consumer serializes grouping decisions.
    let (worker, correlation_tx) = CorrelationWorker::new(
        store.clone(),
        bus_dyn.clone(),
        config.correlation.window_secs,
        config.correlation.queue_capacity,
    );
    let correlation_handle = tokio::spawn(worker.run());

    let service = Arc::new(AlertService::new(
        store.clone(),
        notifier.clone(),
        bus_dyn.clone(),
        Arc::new(PassthroughDirectory),
        rules.clone(),
        correlation_tx,
        Duration::from_secs(config.notify.critical_timeout_secs),
    ));

    let escalation = EscalationSweeper::new(
        store.clone(),
        notifier.clone(),
        bus_dyn.clone(),
        config.escalation.tick_secs,
        config.escalation.batch_limit,
    );
    let escalation_handle = tokio::spawn(async move { escalation.run().await });

    let auto_resolve = AutoResolveSweeper::new(
        store.clone(),
        bus_dyn.clone(),
        config.auto_resolve.tick_secs,
        config.auto_resolve.stale_after_hours,
        config.auto_resolve.batch_limit,
    );
    let auto_resolve_handle = tokio::spawn(async move { auto_resolve.run().await });

    let state = AppState {
        service,
        store,
        rules,
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(listener, app::build_http_app(state));

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    correlation_handle.abort();
    escalation_handle.abort();
    auto_resolve_handle.abort();
    rule_refresh_handle.abort();
    bus_tap_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
