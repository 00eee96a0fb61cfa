use chrono::{DateTime, Utc};
use oxdesk_common::types::EscalationLevel;

/// Remaining time before `deadline`, in hours. Negative once past.
pub fn hours_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (deadline - now).num_seconds() as f64 / 3600.0
}

/// The level a deadline maps to at a given instant, ignoring any current
/// level. Ordered thresholds: breached, then 1h / 2h / 4h out.
fn level_for(hours_left: f64) -> EscalationLevel {
    if hours_left < 0.0 {
        EscalationLevel::Breach
    } else if hours_left < 1.0 {
        EscalationLevel::Critical
    } else if hours_left < 2.0 {
        EscalationLevel::Elevated
    } else if hours_left < 4.0 {
        EscalationLevel::Watch
    } else {
        EscalationLevel::None
    }
}

/// A single forward step of an SLA record's escalation level.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationStep {
    pub level: EscalationLevel,
    /// Action recorded in the append-only escalation history.
    pub action: &'static str,
    pub hours_remaining: f64,
}

/// Evaluate a deadline against the current level.
///
/// Returns `Some` only when the deadline maps to a level *above* the current
/// one; the level never moves backward, so a record that was already
/// breached stays breached even if the deadline is later edited.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use oxdesk_common::types::EscalationLevel;
/// use oxdesk_sla::escalation::step;
///
/// let now = Utc::now();
/// let overdue = now - Duration::minutes(30);
/// let s = step(EscalationLevel::None, overdue, now).unwrap();
/// assert_eq!(s.level, EscalationLevel::Breach);
///
/// // Same input again: already at breach, nothing to advance.
/// assert!(step(EscalationLevel::Breach, overdue, now).is_none());
/// ```
pub fn step(
    current: EscalationLevel,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<EscalationStep> {
    let hours_left = hours_remaining(deadline, now);
    let target = level_for(hours_left);

    if target <= current {
        return None;
    }

    let action = if target == EscalationLevel::Breach {
        "deadline_breached"
    } else {
        "threshold_crossed"
    };

    Some(EscalationStep {
        level: target,
        action,
        hours_remaining: hours_left,
    })
}
