use crate::plugin::ChannelPlugin;
use crate::{NotificationChannel, RecipientResult, SendResponse};
use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use oxdesk_common::types::EscalationNotice;
use serde::Deserialize;
use serde_json::Value;
use tracing;

pub struct EmailChannel {
    instance_id: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(
        instance_id: &str,
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?.port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        let transport = builder.build();
        Ok(Self {
            instance_id: instance_id.to_string(),
            transport,
            from: from.to_string(),
        })
    }

    pub(crate) fn format_subject(notice: &EscalationNotice) -> String {
        let breach_tag = if notice.hours_remaining < 0.0 {
            " [SLA BREACHED]"
        } else {
            ""
        };
        format!(
            "[oxdesk][L{}]{} {} - {}",
            notice.level.as_u8(),
            breach_tag,
            notice.ticket_number,
            notice.subject
        )
    }

    pub(crate) fn format_body(notice: &EscalationNotice) -> String {
        let remaining_line = if notice.hours_remaining < 0.0 {
            format!(
                "Overdue by: {:.1}h (deadline {})",
                -notice.hours_remaining, notice.deadline
            )
        } else {
            format!(
                "Remaining: {:.1}h (deadline {})",
                notice.hours_remaining, notice.deadline
            )
        };
        format!(
            "Ticket: {number} - {subject}\nPriority: {priority}\nSLA: {sla_type}\nEscalation level: {level}\n{remaining}\nMessage: {message}",
            number = notice.ticket_number,
            subject = notice.subject,
            priority = notice.priority,
            sla_type = notice.sla_type,
            level = notice.level.as_u8(),
            remaining = remaining_line,
            message = notice.message,
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(
        &self,
        notice: &EscalationNotice,
        recipients: &[String],
    ) -> Result<SendResponse> {
        let subject = Self::format_subject(notice);
        let body = Self::format_body(notice);

        let mut response = SendResponse::default();
        if recipients.is_empty() {
            return Ok(response);
        }

        let mut total_retries = 0u32;
        let mut recipient_results = Vec::new();

        for recipient in recipients {
            let email = Message::builder()
                .from(self.from.parse()?)
                .to(recipient.parse()?)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())?;

            let mut last_err = None;
            let mut attempts = 0u32;
            for attempt in 0..3 {
                attempts = attempt + 1;
                match self.transport.send(email.clone()).await {
                    Ok(_) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempts,
                            recipient = %recipient,
                            error = %e,
                            "Email send failed, retrying"
                        );
                        last_err = Some(e);
                        if attempt < 2 {
                            tokio::time::sleep(std::time::Duration::from_millis(
                                100 * 2u64.pow(attempt),
                            ))
                            .await;
                        }
                    }
                }
            }

            total_retries += attempts.saturating_sub(1);

            if let Some(e) = last_err {
                tracing::error!(recipient = %recipient, error = %e, "Email send failed after 3 retries");
                recipient_results.push(RecipientResult {
                    recipient: recipient.clone(),
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                });
            } else {
                recipient_results.push(RecipientResult {
                    recipient: recipient.clone(),
                    status: "success".to_string(),
                    error: None,
                });
            }
        }

        response.retry_count = total_retries;
        response.recipient_results = recipient_results;
        Ok(response)
    }

    fn channel_type(&self) -> &str {
        "email"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

// Plugin

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from: String,
}

pub struct EmailPlugin;

impl ChannelPlugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn recipient_type(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<EmailConfig>(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid email config: {e}"))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid email config: {e}"))?;
        let channel = EmailChannel::new(
            instance_id,
            &cfg.smtp_host,
            cfg.smtp_port,
            cfg.smtp_username.as_deref(),
            cfg.smtp_password.as_deref(),
            &cfg.from,
        )?;
        Ok(Box::new(channel))
    }
}
