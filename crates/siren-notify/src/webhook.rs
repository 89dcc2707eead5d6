use async_trait::async_trait;
use std::time::Duration;

use crate::error::{NotifyError, Result};
use crate::{NotificationEvent, Notifier};

/// Posts notification events as JSON to a fixed endpoint.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("empty webhook url".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "event": event.kind.to_string(),
                "alert_id": event.alert_id,
                "title": event.title,
                "severity": event.severity.to_string(),
                "source": event.source,
                "resource_ref": event.resource_ref,
                "escalation_level": event.escalation_level,
                "occurrence_count": event.occurrence_count,
                "timestamp": event.timestamp.to_rfc3339(),
            }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(NotifyError::Endpoint {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
