use std::sync::Arc;

use chrono::{Duration, Utc};
use oxdesk_common::types::{EscalationLevel, EscalationNotice, Priority, SlaType};
use oxdesk_storage::{ChannelRow, NotificationLogFilter, RecipientRow, TicketStore};
use serde_json::json;

use crate::channels::email::EmailChannel;
use crate::channels::webhook::WebhookChannel;
use crate::manager::{select_recipients, NotificationManager};
use crate::plugin::ChannelRegistry;

fn make_notice(level: EscalationLevel, hours_remaining: f64) -> EscalationNotice {
    let now = Utc::now();
    EscalationNotice {
        id: "n-1".to_string(),
        sla_id: "s-1".to_string(),
        ticket_id: "t-1".to_string(),
        ticket_number: "TKT-000007".to_string(),
        subject: "Checkout page returns 502".to_string(),
        priority: Priority::Urgent,
        sla_type: SlaType::Resolution,
        level,
        deadline: now + Duration::minutes((hours_remaining * 60.0) as i64),
        hours_remaining,
        message: "Resolution SLA at risk".to_string(),
        agent_email: Some("alice@example.com".to_string()),
        created_at: now,
    }
}

fn make_channel(channel_type: &str, min_level: u8) -> ChannelRow {
    let now = Utc::now();
    ChannelRow {
        id: "c-1".to_string(),
        name: format!("primary-{channel_type}"),
        channel_type: channel_type.to_string(),
        description: None,
        min_level,
        enabled: true,
        config: json!({}),
        created_at: now,
        updated_at: now,
    }
}

fn make_recipient(value: &str, manager_only: bool) -> RecipientRow {
    RecipientRow {
        id: oxdesk_common::id::next_id(),
        channel_id: "c-1".to_string(),
        value: value.to_string(),
        manager_only,
        created_at: Utc::now(),
    }
}

#[test]
fn registry_has_builtin_plugins() {
    let registry = ChannelRegistry::default();
    assert!(registry.has_plugin("email"));
    assert!(registry.has_plugin("webhook"));
    assert!(!registry.has_plugin("sms"));

    let mut names = registry.plugin_names();
    names.sort();
    assert_eq!(names, vec!["email", "webhook"]);
}

#[test]
fn email_config_validation() {
    let registry = ChannelRegistry::default();
    let plugin = registry.get_plugin("email").unwrap();

    let valid = json!({
        "smtp_host": "smtp.example.com",
        "smtp_port": 587,
        "from": "desk@example.com"
    });
    assert!(plugin.validate_config(&valid).is_ok());

    let missing_host = json!({"smtp_port": 587, "from": "desk@example.com"});
    assert!(plugin.validate_config(&missing_host).is_err());
}

#[test]
fn email_redacts_password() {
    let registry = ChannelRegistry::default();
    let plugin = registry.get_plugin("email").unwrap();

    let config = json!({
        "smtp_host": "smtp.example.com",
        "smtp_port": 587,
        "smtp_password": "hunter2",
        "from": "desk@example.com"
    });
    let redacted = plugin.redact_config(&config);
    assert_eq!(redacted["smtp_password"], "***");
    assert_eq!(redacted["smtp_host"], "smtp.example.com");
}

#[test]
fn webhook_redacts_credential_headers() {
    let registry = ChannelRegistry::default();
    let plugin = registry.get_plugin("webhook").unwrap();

    let config = json!({
        "body_template": "{\"ticket\":\"{{ticket_number}}\"}",
        "headers": {
            "Authorization": "Bearer abc",
            "X-Api-Key": "k-123",
            "Content-Type": "application/json"
        }
    });
    let redacted = plugin.redact_config(&config);
    assert_eq!(redacted["headers"]["Authorization"], "***");
    assert_eq!(redacted["headers"]["X-Api-Key"], "***");
    assert_eq!(redacted["headers"]["Content-Type"], "application/json");
    assert_eq!(redacted["body_template"], config["body_template"]);
}

#[test]
fn unknown_channel_type_rejected() {
    let registry = ChannelRegistry::default();
    let result = registry.create_channel("pager", "c-1", &json!({}));
    assert!(result.is_err());
}

#[test]
fn email_subject_flags_breach() {
    let at_risk = make_notice(EscalationLevel::Elevated, 1.5);
    let subject = EmailChannel::format_subject(&at_risk);
    assert!(subject.contains("[L2]"));
    assert!(subject.contains("TKT-000007"));
    assert!(!subject.contains("BREACHED"));

    let breached = make_notice(EscalationLevel::Breach, -0.5);
    let subject = EmailChannel::format_subject(&breached);
    assert!(subject.contains("[L4]"));
    assert!(subject.contains("SLA BREACHED"));
}

#[test]
fn email_body_shows_overdue_hours() {
    let breached = make_notice(EscalationLevel::Breach, -2.0);
    let body = EmailChannel::format_body(&breached);
    assert!(body.contains("Overdue by: 2.0h"));
    assert!(body.contains("Priority: urgent"));
}

#[test]
fn webhook_template_substitution() {
    let channel = WebhookChannel::new(
        "c-1",
        Some(r#"{"ticket":"{{ticket_number}}","level":{{level}}}"#.to_string()),
        Default::default(),
    );
    let notice = make_notice(EscalationLevel::Critical, 0.5);
    let body = channel.render_body(&notice);
    assert_eq!(body, r#"{"ticket":"TKT-000007","level":3}"#);
}

#[test]
fn webhook_default_body_is_json() {
    let channel = WebhookChannel::new("c-1", None, Default::default());
    let notice = make_notice(EscalationLevel::Breach, -1.0);
    let value: serde_json::Value = serde_json::from_str(&channel.render_body(&notice)).unwrap();
    assert_eq!(value["ticket_number"], "TKT-000007");
    assert_eq!(value["level"], 4);
    assert_eq!(value["status"], "breached");
}

#[test]
fn manager_only_recipients_gated_by_level() {
    let channel = make_channel("webhook", 1);
    let configured = vec![
        make_recipient("https://hooks.example.com/a", false),
        make_recipient("https://hooks.example.com/mgr", true),
    ];

    let low = make_notice(EscalationLevel::Watch, 3.0);
    let recipients = select_recipients(&channel, &configured, &low, &[]);
    assert_eq!(recipients, vec!["https://hooks.example.com/a".to_string()]);

    let high = make_notice(EscalationLevel::Critical, 0.5);
    let recipients = select_recipients(&channel, &configured, &high, &[]);
    assert_eq!(recipients.len(), 2);
}

#[test]
fn email_channel_adds_agent_and_managers() {
    let channel = make_channel("email", 1);
    let configured = vec![make_recipient("oncall@example.com", false)];
    let managers = vec!["boss@example.com".to_string()];

    let low = make_notice(EscalationLevel::Elevated, 1.5);
    let recipients = select_recipients(&channel, &configured, &low, &managers);
    assert_eq!(
        recipients,
        vec!["alice@example.com".to_string(), "oncall@example.com".to_string()]
    );

    let high = make_notice(EscalationLevel::Critical, 0.5);
    let recipients = select_recipients(&channel, &configured, &high, &managers);
    assert!(recipients.contains(&"boss@example.com".to_string()));
    assert_eq!(recipients.len(), 3);
}

#[test]
fn duplicate_recipients_collapsed() {
    let channel = make_channel("email", 1);
    let configured = vec![make_recipient("alice@example.com", false)];

    // agent is also a configured recipient
    let notice = make_notice(EscalationLevel::Elevated, 1.5);
    let recipients = select_recipients(&channel, &configured, &notice, &[]);
    assert_eq!(recipients, vec!["alice@example.com".to_string()]);
}

#[tokio::test]
async fn dispatch_skips_channels_below_min_level() {
    oxdesk_common::id::init(1, 1);
    let store = Arc::new(TicketStore::new("sqlite::memory:").await.unwrap());

    let mut channel = make_channel("webhook", 4);
    channel.id = oxdesk_common::id::next_id();
    store.insert_channel(&channel).await.unwrap();

    let manager = NotificationManager::new(store.clone(), ChannelRegistry::default());
    let notice = make_notice(EscalationLevel::Elevated, 1.5);
    manager.dispatch(&notice, &[]).await;

    // below min_level, so no delivery was attempted and nothing was logged
    let logs = store
        .list_notification_logs(&NotificationLogFilter::default(), 50, 0)
        .await
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn dispatch_records_failed_delivery() {
    oxdesk_common::id::init(1, 1);
    let store = Arc::new(TicketStore::new("sqlite::memory:").await.unwrap());

    let mut channel = make_channel("webhook", 1);
    channel.id = oxdesk_common::id::next_id();
    store.insert_channel(&channel).await.unwrap();
    store
        .insert_recipient(&RecipientRow {
            id: oxdesk_common::id::next_id(),
            channel_id: channel.id.clone(),
            // nothing listens here, delivery fails after retries
            value: "http://127.0.0.1:9/".to_string(),
            manager_only: false,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let manager = NotificationManager::new(store.clone(), ChannelRegistry::default());
    let notice = make_notice(EscalationLevel::Breach, -0.5);
    manager.dispatch(&notice, &[]).await;

    let logs = store
        .list_notification_logs(&NotificationLogFilter::default(), 50, 0)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "failed");
    assert_eq!(logs[0].level, 4);
    assert_eq!(logs[0].recipient_count, 1);
    assert!(logs[0].error_message.is_some());
}
