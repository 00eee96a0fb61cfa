use oxdesk_common::types::{Priority, TicketSnapshot};
use serde::Serialize;

/// Fallback when there is no resolution history to average over.
pub const DEFAULT_AVG_RESOLUTION_HOURS: f64 = 24.0;

/// How many recently resolved tickets feed the historical average.
pub const RESOLVED_SAMPLE_SIZE: usize = 30;

/// Added wait when no agent is online.
const NO_AGENT_PENALTY_HOURS: f64 = 4.0;

/// Multiplier when exactly one agent is online.
const SINGLE_AGENT_FACTOR: f64 = 1.2;

/// Queue position and wait estimate for a candidate ticket.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEstimate {
    /// 1-based rank among unresolved tickets.
    pub position: usize,
    pub estimated_wait_hours: f64,
    /// The historical average the estimate was scaled from.
    pub average_resolution_hours: f64,
}

/// Sort unresolved tickets into queue order: priority rank descending,
/// then oldest first.
pub fn queue_order(tickets: &mut [TicketSnapshot]) {
    tickets.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// 1-based queue position for a new ticket of the given priority: every
/// existing unresolved ticket of equal or higher rank sits ahead of it.
pub fn queue_position(open_tickets: &[TicketSnapshot], candidate: Priority) -> usize {
    let ahead = open_tickets
        .iter()
        .filter(|t| t.status.is_unresolved() && t.priority.rank() >= candidate.rank())
        .count();
    ahead + 1
}

/// Average over the resolution-duration samples, falling back to the 24h
/// default when the history is empty.
pub fn average_resolution_hours(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return DEFAULT_AVG_RESOLUTION_HOURS;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn priority_factor(priority: Priority) -> f64 {
    match priority {
        Priority::Urgent => 0.25,
        Priority::High => 0.5,
        Priority::Medium => 1.0,
        Priority::Low => 1.5,
    }
}

/// Scale the historical average by priority, then adjust for agent
/// availability: nobody online adds four hours, a lone agent stretches the
/// estimate by 20%.
pub fn estimate_wait_hours(avg_hours: f64, candidate: Priority, online_agents: usize) -> f64 {
    let base = avg_hours * priority_factor(candidate);
    match online_agents {
        0 => base + NO_AGENT_PENALTY_HOURS,
        1 => base * SINGLE_AGENT_FACTOR,
        _ => base,
    }
}

/// Full estimate from a snapshot of the backlog, the recent resolution
/// history (hours per ticket, newest first, at most
/// [`RESOLVED_SAMPLE_SIZE`] entries), and the online agent count.
///
/// # Examples
///
/// ```
/// use oxdesk_common::types::Priority;
/// use oxdesk_sla::queue::estimate;
///
/// // No backlog, no history, nobody online: default 24h, medium x1, +4h.
/// let e = estimate(&[], Priority::Medium, &[], 0);
/// assert_eq!(e.position, 1);
/// assert_eq!(e.estimated_wait_hours, 28.0);
/// ```
pub fn estimate(
    open_tickets: &[TicketSnapshot],
    candidate: Priority,
    resolution_hours: &[f64],
    online_agents: usize,
) -> QueueEstimate {
    let samples = &resolution_hours[..resolution_hours.len().min(RESOLVED_SAMPLE_SIZE)];
    let avg = average_resolution_hours(samples);
    QueueEstimate {
        position: queue_position(open_tickets, candidate),
        estimated_wait_hours: estimate_wait_hours(avg, candidate, online_agents),
        average_resolution_hours: avg,
    }
}
