use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket priority, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use oxdesk_common::types::Priority;
///
/// let p: Priority = "high".parse().unwrap();
/// assert_eq!(p, Priority::High);
/// assert_eq!(p.to_string(), "high");
/// assert!(Priority::Urgent > Priority::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Numeric rank used for queue ordering (low=1 .. urgent=4).
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

/// Ticket lifecycle status. Transitions are monotonic in practice but not
/// enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Open and in-progress tickets count toward the queue.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::InProgress)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::InProgress => write!(f, "in_progress"),
            TicketStatus::Resolved => write!(f, "resolved"),
            TicketStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(format!("unknown ticket status: {s}")),
        }
    }
}

/// What an SLA tracking record measures: time to first public agent reply,
/// or time to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaType {
    Response,
    Resolution,
}

impl std::fmt::Display for SlaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaType::Response => write!(f, "response"),
            SlaType::Resolution => write!(f, "resolution"),
        }
    }
}

impl std::str::FromStr for SlaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "response" => Ok(SlaType::Response),
            "resolution" => Ok(SlaType::Resolution),
            _ => Err(format!("unknown sla type: {s}")),
        }
    }
}

/// Escalation severity tier (0 none .. 4 breached), ordered.
///
/// Levels only ever advance during automatic stepping; they drop back to
/// [`EscalationLevel::None`] only when tracking is recreated.
///
/// # Examples
///
/// ```
/// use oxdesk_common::types::EscalationLevel;
///
/// assert!(EscalationLevel::Breach > EscalationLevel::Watch);
/// assert_eq!(EscalationLevel::from_u8(4), Some(EscalationLevel::Breach));
/// assert_eq!(EscalationLevel::Critical.as_u8(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationLevel {
    None,
    Watch,
    Elevated,
    Critical,
    Breach,
}

impl EscalationLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            EscalationLevel::None => 0,
            EscalationLevel::Watch => 1,
            EscalationLevel::Elevated => 2,
            EscalationLevel::Critical => 3,
            EscalationLevel::Breach => 4,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(EscalationLevel::None),
            1 => Some(EscalationLevel::Watch),
            2 => Some(EscalationLevel::Elevated),
            3 => Some(EscalationLevel::Critical),
            4 => Some(EscalationLevel::Breach),
            _ => None,
        }
    }

    /// Managers are pulled into the notification fan-out from critical on.
    pub fn notifies_managers(&self) -> bool {
        *self >= EscalationLevel::Critical
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationLevel::None => write!(f, "none"),
            EscalationLevel::Watch => write!(f, "watch"),
            EscalationLevel::Elevated => write!(f, "elevated"),
            EscalationLevel::Critical => write!(f, "critical"),
            EscalationLevel::Breach => write!(f, "breach"),
        }
    }
}

/// Minimal ticket view used by the queue estimator: enough to rank a ticket
/// without dragging the full row around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub id: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

/// An escalation notice produced by the SLA stepper and handed to the
/// notification manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub id: String,
    pub sla_id: String,
    pub ticket_id: String,
    pub ticket_number: String,
    pub subject: String,
    pub priority: Priority,
    pub sla_type: SlaType,
    pub level: EscalationLevel,
    pub deadline: DateTime<Utc>,
    /// Negative once the deadline has passed.
    pub hours_remaining: f64,
    pub message: String,
    /// Email of the assigned agent, when the ticket has one.
    pub agent_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Format a tag list into a human-readable string.
///
/// # Examples
///
/// ```
/// use oxdesk_common::types::format_tags;
///
/// let tags = vec!["billing".to_string(), "vip".to_string()];
/// assert_eq!(format_tags(&tags), "billing, vip");
/// assert_eq!(format_tags(&[]), "");
/// ```
pub fn format_tags(tags: &[String]) -> String {
    tags.join(", ")
}
