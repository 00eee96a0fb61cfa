use anyhow::Result;
use chrono::Utc;
use oxdesk_common::types::{EscalationLevel, EscalationNotice, Priority, SlaType, TicketStatus};
use oxdesk_notify::manager::NotificationManager;
use oxdesk_sla::escalation;
use oxdesk_storage::{EscalationEventRow, SlaRow, TicketRow, TicketStore};
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Periodic sweep over active SLA records.
///
/// Each tick re-evaluates every active deadline against the escalation
/// thresholds, persists any forward step, appends it to the escalation
/// history, and fans a notice out through the notification manager.
/// Records whose ticket is gone or no longer unresolved are retired.
pub struct SlaScheduler {
    store: Arc<TicketStore>,
    notifier: Arc<NotificationManager>,
    tick_secs: u64,
}

impl SlaScheduler {
    pub fn new(store: Arc<TicketStore>, notifier: Arc<NotificationManager>, tick_secs: u64) -> Self {
        Self {
            store,
            notifier,
            tick_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "SLA escalation scheduler started");

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.sweep().await {
                tracing::error!(error = %e, "SLA escalation sweep failed");
            }
        }
    }

    /// One pass over the active records. Per-record failures are logged
    /// and never stop the rest of the sweep.
    pub async fn sweep(&self) -> Result<()> {
        let records = self.store.list_active_slas().await?;
        if records.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        for record in records {
            if let Err(e) = self.evaluate(&record, now).await {
                tracing::error!(sla_id = %record.id, error = %e, "Failed to evaluate SLA record");
            }
        }
        Ok(())
    }

    async fn evaluate(&self, record: &SlaRow, now: chrono::DateTime<Utc>) -> Result<()> {
        let ticket = match self.store.get_ticket(&record.ticket_id).await? {
            Some(t) => t,
            None => {
                tracing::warn!(sla_id = %record.id, "SLA record for missing ticket, retiring");
                self.store.deactivate_sla(&record.id).await?;
                return Ok(());
            }
        };

        let status: TicketStatus = ticket.status.parse().unwrap_or(TicketStatus::Open);
        if !status.is_unresolved() {
            self.store.deactivate_sla(&record.id).await?;
            return Ok(());
        }

        let current = EscalationLevel::from_u8(record.escalation_level)
            .unwrap_or(EscalationLevel::None);
        let Some(step) = escalation::step(current, record.deadline, now) else {
            return Ok(());
        };

        // Another sweep may have advanced the row in the meantime; the
        // store refuses backward or equal moves.
        if !self
            .store
            .update_sla_level(&record.id, step.level.as_u8())
            .await?
        {
            return Ok(());
        }

        self.store
            .insert_escalation_event(&EscalationEventRow {
                id: oxdesk_common::id::next_id(),
                sla_id: record.id.clone(),
                level: step.level.as_u8(),
                action: step.action.to_string(),
                created_at: now,
            })
            .await?;

        tracing::warn!(
            ticket = %ticket.ticket_number,
            sla_type = %record.sla_type,
            level = step.level.as_u8(),
            hours_remaining = format!("{:.2}", step.hours_remaining),
            "SLA escalation"
        );

        let notice = self.build_notice(record, &ticket, &step, now).await;
        let manager_emails = if notice.level.notifies_managers() {
            self.store.list_manager_emails().await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to load manager emails");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        self.notifier.dispatch(&notice, &manager_emails).await;
        Ok(())
    }

    async fn build_notice(
        &self,
        record: &SlaRow,
        ticket: &TicketRow,
        step: &escalation::EscalationStep,
        now: chrono::DateTime<Utc>,
    ) -> EscalationNotice {
        let agent_email = match &ticket.agent_id {
            Some(agent_id) => match self.store.get_agent(agent_id).await {
                Ok(agent) => agent.map(|a| a.email),
                Err(e) => {
                    tracing::error!(agent_id = %agent_id, error = %e, "Failed to load agent");
                    None
                }
            },
            None => None,
        };

        let sla_type: SlaType = record.sla_type.parse().unwrap_or(SlaType::Resolution);
        let priority: Priority = ticket.priority.parse().unwrap_or(Priority::Medium);
        let message = if step.hours_remaining < 0.0 {
            format!(
                "{} SLA breached: ticket {} is {:.1}h past its deadline",
                sla_type,
                ticket.ticket_number,
                -step.hours_remaining
            )
        } else {
            format!(
                "{} SLA at risk: ticket {} has {:.1}h left before its deadline",
                sla_type, ticket.ticket_number, step.hours_remaining
            )
        };

        EscalationNotice {
            id: oxdesk_common::id::next_id(),
            sla_id: record.id.clone(),
            ticket_id: ticket.id.clone(),
            ticket_number: ticket.ticket_number.clone(),
            subject: ticket.subject.clone(),
            priority,
            sla_type,
            level: step.level,
            deadline: record.deadline,
            hours_remaining: step.hours_remaining,
            message,
            agent_email,
            created_at: now,
        }
    }
}
