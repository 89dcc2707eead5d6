use crate::error::{NotifyError, Result};
use crate::manager::{ChannelRoute, NotificationManager};
use crate::{NotificationEvent, NotificationKind, Notifier};
use async_trait::async_trait;
use chrono::Utc;
use siren_common::types::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingChannel {
    name: &'static str,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl Notifier for CountingChannel {
    async fn notify(&self, _event: &NotificationEvent) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(NotifyError::Other("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    fn channel_name(&self) -> &str {
        self.name
    }
}

fn make_event(severity: Severity) -> NotificationEvent {
    NotificationEvent {
        kind: NotificationKind::Created,
        alert_id: "alert-1".to_string(),
        title: "CPU high".to_string(),
        severity,
        source: "health-check".to_string(),
        resource_ref: None,
        escalation_level: 0,
        occurrence_count: 1,
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn routes_filter_by_min_severity() {
    let low_calls = Arc::new(AtomicUsize::new(0));
    let crit_calls = Arc::new(AtomicUsize::new(0));
    let manager = NotificationManager::new(vec![
        ChannelRoute {
            min_severity: Severity::Low,
            channel: Box::new(CountingChannel {
                name: "all",
                calls: low_calls.clone(),
                fail: false,
            }),
        },
        ChannelRoute {
            min_severity: Severity::Critical,
            channel: Box::new(CountingChannel {
                name: "pager",
                calls: crit_calls.clone(),
                fail: false,
            }),
        },
    ]);

    manager.dispatch(&make_event(Severity::Medium)).await;
    assert_eq!(low_calls.load(Ordering::SeqCst), 1);
    assert_eq!(crit_calls.load(Ordering::SeqCst), 0);

    manager.dispatch(&make_event(Severity::Critical)).await;
    assert_eq!(low_calls.load(Ordering::SeqCst), 2);
    assert_eq!(crit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_channel_does_not_block_others() {
    let ok_calls = Arc::new(AtomicUsize::new(0));
    let manager = NotificationManager::new(vec![
        ChannelRoute {
            min_severity: Severity::Low,
            channel: Box::new(CountingChannel {
                name: "broken",
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
        },
        ChannelRoute {
            min_severity: Severity::Low,
            channel: Box::new(CountingChannel {
                name: "ok",
                calls: ok_calls.clone(),
                fail: false,
            }),
        },
    ]);

    manager.dispatch(&make_event(Severity::High)).await;
    assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
}
