use siren_common::types::Severity;

use crate::{NotificationEvent, Notifier};

/// Routes an event to a channel when its severity is at or above the
/// route's minimum.
pub struct ChannelRoute {
    pub min_severity: Severity,
    pub channel: Box<dyn Notifier>,
}

impl ChannelRoute {
    pub fn should_send(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

/// Fans an event out to every matching channel. Delivery failures are
/// logged and never propagated; a dead channel must not take paging down
/// for the others.
pub struct NotificationManager {
    routes: Vec<ChannelRoute>,
}

impl NotificationManager {
    pub fn new(routes: Vec<ChannelRoute>) -> Self {
        Self { routes }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub async fn dispatch(&self, event: &NotificationEvent) {
        for route in &self.routes {
            if !route.should_send(event.severity) {
                continue;
            }
            if let Err(e) = route.channel.notify(event).await {
                tracing::error!(
                    channel = route.channel.channel_name(),
                    alert_id = %event.alert_id,
                    error = %e,
                    "Failed to send notification"
                );
            } else {
                tracing::debug!(
                    channel = route.channel.channel_name(),
                    alert_id = %event.alert_id,
                    kind = %event.kind,
                    "Notification delivered"
                );
            }
        }
    }
}
