//! Escalation notice delivery with pluggable channel support.
//!
//! When the SLA scheduler raises an escalation level it produces an
//! [`EscalationNotice`], which the [`manager::NotificationManager`] fans
//! out to every enabled [`NotificationChannel`] whose minimum level is
//! reached. Built-in channels are email (SMTP) and webhook.

pub mod channels;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod utils;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use oxdesk_common::types::EscalationNotice;

/// Per-recipient delivery outcome.
#[derive(Debug, Clone)]
pub struct RecipientResult {
    pub recipient: String,
    pub status: String,
    pub error: Option<String>,
}

/// Aggregate outcome of one channel delivery.
#[derive(Debug, Clone, Default)]
pub struct SendResponse {
    pub retry_count: u32,
    pub recipient_results: Vec<RecipientResult>,
}

impl SendResponse {
    /// True if every recipient was delivered to.
    pub fn all_delivered(&self) -> bool {
        self.recipient_results.iter().all(|r| r.status == "success")
    }

    /// True if at least one recipient was delivered to.
    pub fn any_delivered(&self) -> bool {
        self.recipient_results.iter().any(|r| r.status == "success")
    }

    /// First recipient error, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.recipient_results
            .iter()
            .find_map(|r| r.error.as_deref())
    }
}

/// A delivery channel that pushes escalation notices to an external
/// service (SMTP relay, webhook endpoint).
///
/// Implementations are created by the matching [`plugin::ChannelPlugin`]
/// from the channel's stored JSON configuration.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the notice to every recipient, retrying transient
    /// failures per recipient.
    async fn send(&self, notice: &EscalationNotice, recipients: &[String])
        -> Result<SendResponse>;

    /// Channel type name (e.g. `"email"`, `"webhook"`).
    fn channel_type(&self) -> &str;

    /// Database row ID of the channel instance this was built from.
    fn instance_id(&self) -> &str;
}
