use chrono::Duration;
use siren_common::types::AlertStatus;

/// Staged escalation intervals in minutes. Indexed by the escalation level
/// being entered (clamped), so the cadence plateaus at 240 minutes and
/// escalation keeps re-firing at that cadence until the alert leaves OPEN.
pub const ESCALATION_INTERVALS_MIN: [i64; 5] = [15, 30, 60, 120, 240];

/// Interval to wait before the next escalation once `level` is reached.
/// `level` is 1-based: the first escalation (level 1) waits 15 minutes.
pub fn escalation_interval(level: i64) -> Duration {
    let idx = ((level - 1).max(0) as usize).min(ESCALATION_INTERVALS_MIN.len() - 1);
    Duration::minutes(ESCALATION_INTERVALS_MIN[idx])
}

/// Interval seeded onto a newly created alert so the escalation sweep has a
/// first deadline to act on.
pub fn initial_escalation_interval() -> Duration {
    escalation_interval(1)
}

pub fn can_acknowledge(status: AlertStatus) -> bool {
    status == AlertStatus::Open
}

pub fn can_resolve(status: AlertStatus) -> bool {
    status.is_active()
}

pub fn can_escalate(status: AlertStatus) -> bool {
    status == AlertStatus::Open
}
