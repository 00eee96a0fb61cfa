use crate::plugin::ChannelPlugin;
use crate::{NotificationChannel, RecipientResult, SendResponse};
use anyhow::Result;
use async_trait::async_trait;
use oxdesk_common::types::EscalationNotice;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing;

pub struct WebhookChannel {
    instance_id: String,
    client: reqwest::Client,
    body_template: Option<String>,
    headers: HashMap<String, String>,
}

impl WebhookChannel {
    pub fn new(
        instance_id: &str,
        body_template: Option<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            client: reqwest::Client::new(),
            body_template,
            headers,
        }
    }

    pub(crate) fn render_body(&self, notice: &EscalationNotice) -> String {
        if let Some(template) = &self.body_template {
            template
                .replace("{{ticket_id}}", &notice.ticket_id)
                .replace("{{ticket_number}}", &notice.ticket_number)
                .replace("{{subject}}", &notice.subject)
                .replace("{{priority}}", &notice.priority.to_string())
                .replace("{{sla_type}}", &notice.sla_type.to_string())
                .replace("{{level}}", &notice.level.as_u8().to_string())
                .replace(
                    "{{hours_remaining}}",
                    &format!("{:.2}", notice.hours_remaining),
                )
                .replace("{{deadline}}", &notice.deadline.to_rfc3339())
                .replace("{{message}}", &notice.message)
        } else {
            serde_json::json!({
                "notice_id": notice.id,
                "sla_id": notice.sla_id,
                "ticket_id": notice.ticket_id,
                "ticket_number": notice.ticket_number,
                "subject": notice.subject,
                "priority": notice.priority.to_string(),
                "sla_type": notice.sla_type.to_string(),
                "level": notice.level.as_u8(),
                "hours_remaining": notice.hours_remaining,
                "deadline": notice.deadline.to_rfc3339(),
                "message": notice.message,
                "status": if notice.hours_remaining < 0.0 { "breached" } else { "at_risk" },
            })
            .to_string()
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(
        &self,
        notice: &EscalationNotice,
        recipients: &[String],
    ) -> Result<SendResponse> {
        let mut response = SendResponse::default();
        if recipients.is_empty() {
            return Ok(response);
        }

        let body = self.render_body(notice);
        let mut total_retries = 0u32;
        let mut recipient_results = Vec::new();

        for url in recipients {
            let mut last_err = None;
            let mut attempts = 0u32;
            for attempt in 0..3u32 {
                attempts = attempt + 1;
                let mut request = self
                    .client
                    .post(url.as_str())
                    .header("Content-Type", "application/json");
                for (name, value) in &self.headers {
                    request = request.header(name.as_str(), value.as_str());
                }
                match request.body(body.clone()).send().await {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            last_err = None;
                            break;
                        }
                        let resp_body = resp.text().await.unwrap_or_default();
                        tracing::warn!(
                            attempt = attempts,
                            status = %status,
                            "Webhook returned non-success status, retrying"
                        );
                        last_err = Some(anyhow::anyhow!("HTTP {status}: {resp_body}"));
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempts,
                            error = %e,
                            "Webhook send failed, retrying"
                        );
                        last_err = Some(e.into());
                    }
                }
                if attempt < 2 {
                    tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                        .await;
                }
            }

            total_retries += attempts.saturating_sub(1);

            if let Some(e) = last_err {
                tracing::error!(url = %url, error = %e, "Webhook failed after 3 retries");
                recipient_results.push(RecipientResult {
                    recipient: url.clone(),
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                });
            } else {
                recipient_results.push(RecipientResult {
                    recipient: url.clone(),
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
        "webhook"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    body_template: Option<String>,
    /// Extra request headers, e.g. an `Authorization` bearer token.
    #[serde(default)]
    headers: HashMap<String, String>,
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn recipient_type(&self) -> &str {
        "webhook_url"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<WebhookConfig>(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid webhook config: {e}"))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid webhook config: {e}"))?;
        Ok(Box::new(WebhookChannel::new(
            instance_id,
            cfg.body_template,
            cfg.headers,
        )))
    }
}
