mod common;

use chrono::{Duration, Utc};
use common::{build_test_context, request_json, request_no_body};
use oxdesk_server::sla::SlaScheduler;
use oxdesk_storage::SlaRow;
use serde_json::json;

async fn create_ticket(ctx: &common::TestContext, subject: &str) -> String {
    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": subject})),
    )
    .await;
    body["data"]["ticket"]["id"].as_str().unwrap().to_string()
}

fn overdue_sla(ticket_id: &str, hours_past: i64) -> SlaRow {
    let now = Utc::now();
    SlaRow {
        id: oxdesk_common::id::next_id(),
        ticket_id: ticket_id.to_string(),
        sla_type: "resolution".to_string(),
        priority_level: "medium".to_string(),
        deadline: now - Duration::hours(hours_past),
        escalation_level: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn sweep_escalates_overdue_record_to_breach() {
    let ctx = build_test_context().await.expect("test context should build");
    let ticket_id = create_ticket(&ctx, "slow burn").await;

    let sla = ctx
        .state
        .store
        .insert_sla(&overdue_sla(&ticket_id, 2))
        .await
        .expect("sla should insert");

    let scheduler = SlaScheduler::new(
        ctx.state.store.clone(),
        ctx.state.notifier.clone(),
        60,
    );
    scheduler.sweep().await.expect("sweep should succeed");

    let record = ctx
        .state
        .store
        .get_sla(&sla.id)
        .await
        .expect("sla should load")
        .expect("sla should exist");
    assert_eq!(record.escalation_level, 4);
    assert!(record.is_active);

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/sla/records/{}/history", sla.id),
    )
    .await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["level"], 4);
    assert_eq!(events[0]["action"], "deadline_breached");

    // Second sweep: already at breach, nothing new
    scheduler.sweep().await.expect("sweep should succeed");
    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/sla/records/{}/history", sla.id),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn sweep_retires_records_for_resolved_or_missing_tickets() {
    let ctx = build_test_context().await.expect("test context should build");
    let ticket_id = create_ticket(&ctx, "about to be resolved").await;

    let orphan = ctx
        .state
        .store
        .insert_sla(&overdue_sla("no-such-ticket", 1))
        .await
        .expect("sla should insert");

    request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/tickets/{ticket_id}/status"),
        Some(json!({"status": "closed"})),
    )
    .await;

    let scheduler = SlaScheduler::new(
        ctx.state.store.clone(),
        ctx.state.notifier.clone(),
        60,
    );
    scheduler.sweep().await.expect("sweep should succeed");

    let orphan_after = ctx
        .state
        .store
        .get_sla(&orphan.id)
        .await
        .expect("sla should load")
        .expect("sla should exist");
    assert!(!orphan_after.is_active);
    assert_eq!(orphan_after.escalation_level, 0);

    // Nothing active remains anywhere
    let active = ctx
        .state
        .store
        .list_active_slas()
        .await
        .expect("slas should list");
    assert!(active.is_empty());
}

#[tokio::test]
async fn sweep_records_failed_delivery_for_enabled_channel() {
    let ctx = build_test_context().await.expect("test context should build");
    let ticket_id = create_ticket(&ctx, "hot ticket").await;

    // Enabled webhook channel with an unreachable recipient
    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/notifications/channels",
        Some(json!({
            "name": "dead webhook",
            "channel_type": "webhook",
            "min_level": 1,
            "enabled": true,
            "config": {}
        })),
    )
    .await;
    let channel_id = body["data"]["id"].as_str().unwrap().to_string();
    request_json(
        &ctx.app,
        "POST",
        &format!("/v1/notifications/channels/{channel_id}/recipients"),
        Some(json!({"value": "http://127.0.0.1:9/hook"})),
    )
    .await;

    ctx.state
        .store
        .insert_sla(&overdue_sla(&ticket_id, 1))
        .await
        .expect("sla should insert");

    let scheduler = SlaScheduler::new(
        ctx.state.store.clone(),
        ctx.state.notifier.clone(),
        60,
    );
    scheduler.sweep().await.expect("sweep should succeed");

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/notifications/logs?ticket_id__eq={ticket_id}"),
    )
    .await;
    assert_eq!(body["data"]["total"], 1);
    let log = &body["data"]["items"][0];
    assert_eq!(log["status"], "failed");
    assert_eq!(log["level"], 4);
    assert_eq!(log["channel_type"], "webhook");
    assert!(log["error_message"].is_string());
}
