//! Notifier invocation contract for the siren alert engine.
//!
//! The engine pushes [`NotificationEvent`]s at a [`Notifier`]; delivery,
//! retry and fan-out beyond the severity routing in
//! [`manager::NotificationManager`] are the receiving service's concern.
//! The built-in channel posts JSON to a webhook endpoint.

pub mod error;
pub mod manager;
pub mod webhook;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siren_common::types::{Alert, Severity};

use crate::error::Result;

/// What happened to the alert that warrants a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A new critical alert was created.
    Created,
    /// An unresolved alert passed its escalation deadline.
    Escalated,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Created => write!(f, "created"),
            NotificationKind::Escalated => write!(f, "escalated"),
        }
    }
}

/// Payload handed to notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub alert_id: String,
    pub title: String,
    pub severity: Severity,
    pub source: String,
    pub resource_ref: Option<String>,
    pub escalation_level: i64,
    pub occurrence_count: i64,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn from_alert(kind: NotificationKind, alert: &Alert, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            alert_id: alert.id.clone(),
            title: alert.title.clone(),
            severity: alert.severity,
            source: alert.source.clone(),
            resource_ref: alert.resource_ref.clone(),
            escalation_level: alert.escalation_level,
            occurrence_count: alert.occurrence_count,
            timestamp: now,
        }
    }
}

/// A notification delivery channel.
///
/// Implementations are registered in the
/// [`manager::NotificationManager`]'s routing table and invoked for every
/// event at or above their route's minimum severity.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers the event through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails; the manager logs it and
    /// continues with the remaining routes.
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;

    /// Returns the channel type name (e.g., `"webhook"`).
    fn channel_name(&self) -> &str;
}
