use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use oxdesk_common::types::EscalationNotice;
use oxdesk_storage::{ChannelRow, NotificationLogRow, RecipientRow, TicketStore};
use tracing;

use crate::plugin::ChannelRegistry;

/// Routes escalation notices to the configured channels.
///
/// Channel rows live in the database so that operators can enable,
/// disable, and re-point channels without a restart. Each dispatch
/// re-reads the enabled channels, instantiates them through the plugin
/// registry, and records a delivery log row per channel.
pub struct NotificationManager {
    store: Arc<TicketStore>,
    registry: ChannelRegistry,
}

/// Compute the recipient list for one channel.
///
/// Configured recipients flagged `manager_only` are included only when
/// the notice level notifies managers. Email channels additionally get
/// the assigned agent's address and, at manager levels, every manager's
/// address.
pub fn select_recipients(
    channel: &ChannelRow,
    configured: &[RecipientRow],
    notice: &EscalationNotice,
    manager_emails: &[String],
) -> Vec<String> {
    let managers_notified = notice.level.notifies_managers();
    let mut recipients: Vec<String> = configured
        .iter()
        .filter(|r| !r.manager_only || managers_notified)
        .map(|r| r.value.clone())
        .collect();

    if channel.channel_type == "email" {
        if let Some(agent_email) = &notice.agent_email {
            recipients.push(agent_email.clone());
        }
        if managers_notified {
            recipients.extend(manager_emails.iter().cloned());
        }
    }

    recipients.sort();
    recipients.dedup();
    recipients
}

impl NotificationManager {
    pub fn new(store: Arc<TicketStore>, registry: ChannelRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Fan a notice out to every enabled channel whose minimum level is
    /// reached. Failures are logged per channel and never abort the
    /// remaining deliveries.
    pub async fn dispatch(&self, notice: &EscalationNotice, manager_emails: &[String]) {
        let channels = match self.store.list_enabled_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load notification channels");
                return;
            }
        };

        for channel in &channels {
            if notice.level.as_u8() < channel.min_level {
                continue;
            }
            self.dispatch_to_channel(channel, notice, manager_emails)
                .await;
        }
    }

    /// Deliver a notice through a single channel, bypassing the
    /// enabled/min-level routing. Used for channel test sends.
    pub async fn dispatch_to(
        &self,
        channel: &ChannelRow,
        notice: &EscalationNotice,
        manager_emails: &[String],
    ) {
        self.dispatch_to_channel(channel, notice, manager_emails)
            .await;
    }

    async fn dispatch_to_channel(
        &self,
        channel: &ChannelRow,
        notice: &EscalationNotice,
        manager_emails: &[String],
    ) {
        let configured = match self.store.list_recipients(&channel.id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(channel = %channel.name, error = %e, "Failed to load recipients");
                return;
            }
        };
        let recipients = select_recipients(channel, &configured, notice, manager_emails);
        if recipients.is_empty() {
            tracing::debug!(channel = %channel.name, "No recipients for notice, skipping");
            return;
        }

        let started = Instant::now();
        let outcome = match self.registry.create_channel(
            &channel.channel_type,
            &channel.id,
            &channel.config,
        ) {
            Ok(instance) => instance.send(notice, &recipients).await,
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, error_message) = match &outcome {
            Ok(response) if response.all_delivered() => ("sent".to_string(), None),
            Ok(response) if response.any_delivered() => (
                "partial".to_string(),
                response.first_error().map(String::from),
            ),
            Ok(response) => (
                "failed".to_string(),
                response.first_error().map(String::from),
            ),
            Err(e) => ("failed".to_string(), Some(e.to_string())),
        };
        // Webhook errors can carry whole response bodies; cap what we persist.
        let error_message =
            error_message.map(|e| crate::utils::truncate_string(&e, crate::utils::MAX_BODY_LENGTH));

        if let Some(err) = &error_message {
            tracing::error!(
                channel = %channel.name,
                ticket = %notice.ticket_number,
                error = %err,
                "Escalation notice delivery failed"
            );
        } else {
            tracing::info!(
                channel = %channel.name,
                ticket = %notice.ticket_number,
                level = notice.level.as_u8(),
                recipients = recipients.len(),
                "Escalation notice delivered"
            );
        }

        let log = NotificationLogRow {
            id: oxdesk_common::id::next_id(),
            notice_id: notice.id.clone(),
            sla_id: notice.sla_id.clone(),
            ticket_id: notice.ticket_id.clone(),
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            channel_type: channel.channel_type.clone(),
            level: notice.level.as_u8(),
            status,
            error_message,
            duration_ms,
            recipient_count: recipients.len() as u32,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_notification_log(&log).await {
            tracing::error!(error = %e, "Failed to record notification log");
        }
    }
}
