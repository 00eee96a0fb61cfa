use oxdesk_common::types::Priority;
use serde::{Deserialize, Serialize};

/// Factor weights. Must sum to 1.0; checked by a test, not at runtime.
const WEIGHT_BUSINESS_IMPACT: f64 = 0.25;
const WEIGHT_CUSTOMER_VALUE: f64 = 0.20;
const WEIGHT_URGENCY: f64 = 0.20;
const WEIGHT_SLA_RISK: f64 = 0.15;
const WEIGHT_COMPLEXITY: f64 = 0.10;
const WEIGHT_RESOURCE_AVAILABILITY: f64 = 0.10;

const FACTOR_MIN: f64 = 0.0;
const FACTOR_MAX: f64 = 5.0;

/// Six per-ticket factor scores, each expected in [0, 5].
///
/// Out-of-range values are clamped during calculation, never rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityFactors {
    pub business_impact: f64,
    pub customer_value: f64,
    pub urgency: f64,
    pub complexity: f64,
    pub resource_availability: f64,
    pub sla_risk: f64,
}

/// Discrete band the weighted score falls into. The `critical` band exists
/// only in scoring; tickets themselves top out at `urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBand {
    Low,
    Medium,
    High,
    Urgent,
    Critical,
}

impl PriorityBand {
    fn from_score(score: f64) -> Self {
        if score >= 4.2 {
            PriorityBand::Critical
        } else if score >= 3.5 {
            PriorityBand::Urgent
        } else if score >= 2.5 {
            PriorityBand::High
        } else if score >= 1.5 {
            PriorityBand::Medium
        } else {
            PriorityBand::Low
        }
    }

    /// Collapse onto the four-level ticket priority scale.
    pub fn ticket_priority(&self) -> Priority {
        match self {
            PriorityBand::Low => Priority::Low,
            PriorityBand::Medium => Priority::Medium,
            PriorityBand::High => Priority::High,
            PriorityBand::Urgent | PriorityBand::Critical => Priority::Urgent,
        }
    }
}

impl std::fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityBand::Low => write!(f, "low"),
            PriorityBand::Medium => write!(f, "medium"),
            PriorityBand::High => write!(f, "high"),
            PriorityBand::Urgent => write!(f, "urgent"),
            PriorityBand::Critical => write!(f, "critical"),
        }
    }
}

/// Result of a priority calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Weighted sum of the clamped factors, in [0, 5].
    pub final_score: f64,
    pub band: PriorityBand,
    /// The band collapsed onto the ticket priority scale.
    pub priority: Priority,
    /// Heuristic confidence percentage in [55, 100]. Derived from factor
    /// spread, not statistically calibrated.
    pub confidence: u8,
}

fn clamp_factor(value: f64) -> f64 {
    if value.is_nan() {
        return FACTOR_MIN;
    }
    value.clamp(FACTOR_MIN, FACTOR_MAX)
}

/// Compute the weighted priority score for a set of factors.
///
/// # Examples
///
/// ```
/// use oxdesk_sla::priority::{calculate, PriorityFactors};
/// use oxdesk_common::types::Priority;
///
/// let factors = PriorityFactors {
///     business_impact: 5.0,
///     customer_value: 5.0,
///     urgency: 5.0,
///     complexity: 5.0,
///     resource_availability: 5.0,
///     sla_risk: 5.0,
/// };
/// let score = calculate(&factors);
/// assert_eq!(score.final_score, 5.0);
/// assert_eq!(score.priority, Priority::Urgent);
/// ```
pub fn calculate(factors: &PriorityFactors) -> PriorityScore {
    let clamped = [
        clamp_factor(factors.business_impact),
        clamp_factor(factors.customer_value),
        clamp_factor(factors.urgency),
        clamp_factor(factors.sla_risk),
        clamp_factor(factors.complexity),
        clamp_factor(factors.resource_availability),
    ];

    let weighted = clamped[0] * WEIGHT_BUSINESS_IMPACT
        + clamped[1] * WEIGHT_CUSTOMER_VALUE
        + clamped[2] * WEIGHT_URGENCY
        + clamped[3] * WEIGHT_SLA_RISK
        + clamped[4] * WEIGHT_COMPLEXITY
        + clamped[5] * WEIGHT_RESOURCE_AVAILABILITY;

    let final_score = weighted.clamp(FACTOR_MIN, FACTOR_MAX);
    let band = PriorityBand::from_score(final_score);

    // Agreement between factors reads as confidence: a tight cluster of
    // scores is trusted more than a wide spread.
    let max = clamped.iter().cloned().fold(f64::MIN, f64::max);
    let min = clamped.iter().cloned().fold(f64::MAX, f64::min);
    let spread = max - min;
    let confidence = (70.0 + 6.0 * (FACTOR_MAX - spread)).clamp(55.0, 100.0) as u8;

    PriorityScore {
        final_score,
        band,
        priority: band.ticket_priority(),
        confidence,
    }
}

#[cfg(test)]
pub(crate) fn weight_sum() -> f64 {
    WEIGHT_BUSINESS_IMPACT
        + WEIGHT_CUSTOMER_VALUE
        + WEIGHT_URGENCY
        + WEIGHT_SLA_RISK
        + WEIGHT_COMPLEXITY
        + WEIGHT_RESOURCE_AVAILABILITY
}
