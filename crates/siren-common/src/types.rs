use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use siren_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Alert lifecycle status.
///
/// `Resolved` and `Expired` are terminal: no further transition is legal
/// once either is reached. `Expired` is declared for a future TTL policy
/// and is currently produced by no code path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    Suppressed,
    Expired,
}

impl AlertStatus {
    /// An alert counts as active while it is open or acknowledged; only
    /// active alerts participate in deduplication and correlation.
    pub fn is_active(self) -> bool {
        matches!(self, AlertStatus::Open | AlertStatus::Acknowledged)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Expired)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Open => write!(f, "open"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Suppressed => write!(f, "suppressed"),
            AlertStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(AlertStatus::Open),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            "suppressed" => Ok(AlertStatus::Suppressed),
            "expired" => Ok(AlertStatus::Expired),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// Alert classification used for correlation grouping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    System,
    Application,
    Network,
    Security,
    Performance,
    Availability,
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCategory::System => write!(f, "system"),
            AlertCategory::Application => write!(f, "application"),
            AlertCategory::Network => write!(f, "network"),
            AlertCategory::Security => write!(f, "security"),
            AlertCategory::Performance => write!(f, "performance"),
            AlertCategory::Availability => write!(f, "availability"),
        }
    }
}

impl std::str::FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(AlertCategory::System),
            "application" => Ok(AlertCategory::Application),
            "network" => Ok(AlertCategory::Network),
            "security" => Ok(AlertCategory::Security),
            "performance" => Ok(AlertCategory::Performance),
            "availability" => Ok(AlertCategory::Availability),
            _ => Err(format!("unknown alert category: {s}")),
        }
    }
}

/// The alert aggregate.
///
/// `resource_ref` is an id-based back-reference to the monitored entity;
/// the aggregate itself is never embedded. `fingerprint` is immutable once
/// set, and at most one alert per fingerprint may be active at a time.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub category: AlertCategory,
    /// Free-text origin identifier (subsystem or integration).
    pub source: String,
    /// Optional id of the monitored resource this alert refers to.
    pub resource_ref: Option<String>,
    /// Shared identifier for a group of related alerts; set by the
    /// correlation pass once a group of two or more forms.
    pub correlation_id: Option<String>,
    /// Id of the rule that produced the alert, if any.
    pub rule_id: Option<String>,
    /// Deduplication identity hash.
    pub fingerprint: String,
    pub tags: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
    pub metric_value: Option<f64>,
    pub threshold_value: Option<f64>,
    /// Number of times this alert has occurred; incremented on dedup hits.
    pub occurrence_count: i64,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    /// Count of escalation cycles; never decreases.
    pub escalation_level: i64,
    /// Deadline for the next escalation sweep pick-up; cleared on
    /// resolve/suppress.
    pub next_escalation_at: Option<DateTime<Utc>>,
    /// True only when the staleness sweep resolved this alert.
    pub auto_resolved: bool,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// A raw alert-creation signal as received from collectors, health checks
/// or external rules.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateAlertRequest {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub category: AlertCategory,
    pub source: String,
    #[serde(default)]
    pub resource_ref: Option<String>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub metric_value: Option<f64>,
    #[serde(default)]
    pub threshold_value: Option<f64>,
}

/// Aggregate alert statistics.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AlertStats {
    pub total: u64,
    pub open: u64,
    pub acknowledged: u64,
    pub critical_open: u64,
    /// Alerts resolved since local midnight.
    pub resolved_today: u64,
    pub by_severity: HashMap<String, u64>,
    pub by_category: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            AlertStatus::Open,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
            AlertStatus::Suppressed,
            AlertStatus::Expired,
        ] {
            let parsed: AlertStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn active_and_terminal_sets() {
        assert!(AlertStatus::Open.is_active());
        assert!(AlertStatus::Acknowledged.is_active());
        assert!(!AlertStatus::Suppressed.is_active());
        assert!(AlertStatus::Resolved.is_terminal());
        assert!(AlertStatus::Expired.is_terminal());
        assert!(!AlertStatus::Suppressed.is_terminal());
    }
}
