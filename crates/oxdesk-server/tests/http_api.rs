mod common;

use axum::http::StatusCode;
use common::{assert_err_envelope, assert_ok_envelope, build_test_context, request_json, request_no_body};
use serde_json::json;

#[tokio::test]
async fn health_should_return_ok_envelope() {
    let ctx = build_test_context().await.expect("test context should build");
    let (status, body, trace) = request_no_body(&ctx.app, "GET", "/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert!(body["data"]["version"].is_string());
    assert_eq!(body["data"]["storage_status"], "ok");
    assert!(trace.is_some());
}

#[tokio::test]
async fn ticket_create_assigns_number_and_sla_tracking() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "Printer on fire", "category": "hardware"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["ticket"]["ticket_number"], "TKT-000001");
    assert_eq!(body["data"]["ticket"]["priority"], "medium");
    assert_eq!(body["data"]["ticket"]["status"], "open");
    assert_eq!(body["data"]["queue"]["position"], 1);
    // default 24h average, medium x1.0, nobody online +4h
    assert_eq!(body["data"]["queue"]["estimated_wait_hours"], 28.0);
    assert!(body["data"]["priority_score"].is_null());

    let ticket_id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    // Response + resolution tracking rows exist and are active
    let uri = format!("/v1/sla/records?ticket_id__eq={ticket_id}&active__eq=true");
    let (status, body, _) = request_no_body(&ctx.app, "GET", &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    // Second ticket gets the next number
    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "Another one"})),
    )
    .await;
    assert_eq!(body["data"]["ticket"]["ticket_number"], "TKT-000002");
}

#[tokio::test]
async fn ticket_create_with_factors_uses_calculator() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({
            "subject": "Everything is down",
            "factors": {
                "business_impact": 5,
                "customer_value": 5,
                "urgency": 5,
                "complexity": 5,
                "resource_availability": 5,
                "sla_risk": 5
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["priority_score"]["band"], "critical");
    // critical band collapses onto the urgent ticket priority
    assert_eq!(body["data"]["ticket"]["priority"], "urgent");
}

#[tokio::test]
async fn ticket_create_rejects_bad_input() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "x", "priority": "meh"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1101);
}

#[tokio::test]
async fn ticket_lookup_by_id_and_number() {
    let ctx = build_test_context().await.expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "Lost password"})),
    )
    .await;
    let id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/tickets/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subject"], "Lost password");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/tickets/TKT-000001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/tickets/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn ticket_list_filters_by_priority() {
    let ctx = build_test_context().await.expect("test context should build");

    for (subject, priority) in [("a", "low"), ("b", "urgent"), ("c", "urgent")] {
        let (status, _, _) = request_json(
            &ctx.app,
            "POST",
            "/v1/tickets",
            Some(json!({"subject": subject, "priority": priority})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/tickets?priority__eq=urgent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/tickets?limit=1&offset=0").await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn resolving_ticket_retires_sla_tracking() {
    let ctx = build_test_context().await.expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "Flaky VPN"})),
    )
    .await;
    let id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/tickets/{id}/status"),
        Some(json!({"status": "resolved"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "resolved");
    assert!(body["data"]["resolved_at"].is_string());

    let uri = format!("/v1/sla/records?ticket_id__eq={id}&active__eq=true");
    let (_, body, _) = request_no_body(&ctx.app, "GET", &uri).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/tickets/{id}/status"),
        Some(json!({"status": "sideways"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1102);
}

#[tokio::test]
async fn public_agent_reply_completes_response_sla() {
    let ctx = build_test_context().await.expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "Broken login"})),
    )
    .await;
    let id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    // Customer message and internal agent note leave the response SLA alone
    for payload in [
        json!({"author_type": "customer", "body": "Still broken"}),
        json!({"author_type": "agent", "body": "Investigating", "internal": true}),
    ] {
        let (status, _, _) = request_json(
            &ctx.app,
            "POST",
            &format!("/v1/tickets/{id}/messages"),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let uri = format!("/v1/sla/records?ticket_id__eq={id}&sla_type__eq=response&active__eq=true");
    let (_, body, _) = request_no_body(&ctx.app, "GET", &uri).await;
    assert_eq!(body["data"]["total"], 1);

    // A public agent reply retires it
    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/tickets/{id}/messages"),
        Some(json!({"author_type": "agent", "body": "Fixed, please retry"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body, _) = request_no_body(&ctx.app, "GET", &uri).await;
    assert_eq!(body["data"]["total"], 0);

    // Resolution SLA remains active
    let uri =
        format!("/v1/sla/records?ticket_id__eq={id}&sla_type__eq=resolution&active__eq=true");
    let (_, body, _) = request_no_body(&ctx.app, "GET", &uri).await;
    assert_eq!(body["data"]["total"], 1);

    // Internal notes hidden unless asked for
    let (_, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/tickets/{id}/messages")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/tickets/{id}/messages?include_internal=true"),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn message_validation_rejects_bad_author_and_empty_body() {
    let ctx = build_test_context().await.expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "t"})),
    )
    .await;
    let id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/tickets/{id}/messages"),
        Some(json!({"author_type": "robot", "body": "beep"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/tickets/{id}/messages"),
        Some(json!({"author_type": "agent", "body": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn priority_score_endpoint_is_pure() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/priority/score",
        Some(json!({
            "business_impact": 4,
            "customer_value": 3,
            "urgency": 5,
            "complexity": 2,
            "resource_availability": 1,
            "sla_risk": 3
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    // 4*.25 + 3*.20 + 5*.20 + 3*.15 + 2*.10 + 1*.10 = 3.35
    let score = body["data"]["final_score"].as_f64().unwrap();
    assert!((score - 3.35).abs() < 1e-9);
    assert_eq!(body["data"]["band"], "high");
    assert_eq!(body["data"]["priority"], "high");
    let confidence = body["data"]["confidence"].as_u64().unwrap();
    assert!((55..=100).contains(&confidence));
}

#[tokio::test]
async fn queue_estimate_counts_equal_or_higher_ranks() {
    let ctx = build_test_context().await.expect("test context should build");

    for priority in ["urgent", "medium"] {
        let (status, _, _) = request_json(
            &ctx.app,
            "POST",
            "/v1/tickets",
            Some(json!({"subject": "backlog", "priority": priority})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    // let the change feed invalidate the open-ticket cache
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/queue/estimate?priority=low").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["position"], 3);
    // default 24h average, low x1.5, nobody online +4h
    assert_eq!(body["data"]["estimated_wait_hours"], 40.0);
    assert_eq!(body["data"]["online_agents"], 0);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/queue/estimate?priority=whatever").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1101);
}

#[tokio::test]
async fn agent_presence_scales_queue_estimate() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/agents",
        Some(json!({"name": "Sam", "email": "sam@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let agent_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["online"], false);

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/agents/{agent_id}/presence"),
        Some(json!({"online": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["online"], true);
    assert!(body["data"]["last_seen"].is_string());

    // one agent online: 24 x 1.0 x 1.2 = 28.8
    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/queue/estimate?priority=medium").await;
    assert_eq!(body["data"]["online_agents"], 1);
    let wait = body["data"]["estimated_wait_hours"].as_f64().unwrap();
    assert!((wait - 28.8).abs() < 1e-9);
}

#[tokio::test]
async fn ticket_assignment_requires_existing_agent() {
    let ctx = build_test_context().await.expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "assign me"})),
    )
    .await;
    let ticket_id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/tickets/{ticket_id}/assign"),
        Some(json!({"agent_id": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/agents",
        Some(json!({"name": "Kim", "email": "kim@example.com", "role": "manager"})),
    )
    .await;
    let agent_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/tickets/{ticket_id}/assign"),
        Some(json!({"agent_id": agent_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["agent_id"], agent_id.as_str());
}

#[tokio::test]
async fn customer_email_uniqueness_and_tier_validation() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/customers",
        Some(json!({"name": "Acme", "email": "it@acme.test", "tier": "enterprise"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["tier"], "enterprise");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/customers",
        Some(json!({"name": "Acme again", "email": "it@acme.test"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1005);

    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/customers/{id}/tier"),
        Some(json!({"tier": "platinum"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/customers/{id}/tier"),
        Some(json!({"tier": "free"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tier"], "free");
}

#[tokio::test]
async fn dashboard_summary_reports_counts() {
    let ctx = build_test_context().await.expect("test context should build");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "one", "priority": "high"})),
    )
    .await;
    let id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();
    request_json(
        &ctx.app,
        "POST",
        "/v1/tickets",
        Some(json!({"subject": "two"})),
    )
    .await;
    request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/tickets/{id}/status"),
        Some(json!({"status": "resolved"})),
    )
    .await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/dashboard/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["tickets"]["total"], 2);
    assert_eq!(body["data"]["tickets"]["open"], 1);
    assert_eq!(body["data"]["tickets"]["resolved"], 1);
    // resolved ticket retired its two SLA records, the open one keeps two
    assert_eq!(body["data"]["active_slas"], 2);
    assert!(body["data"]["average_resolution_hours"].as_f64().is_some());
}

#[tokio::test]
async fn notification_channel_crud_and_redaction() {
    let ctx = build_test_context().await.expect("test context should build");

    // Email channel demands a full SMTP config
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/notifications/channels",
        Some(json!({"name": "mail", "channel_type": "email", "config": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1104);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/notifications/channels",
        Some(json!({
            "name": "mail",
            "channel_type": "email",
            "min_level": 3,
            "config": {
                "smtp_host": "smtp.test",
                "smtp_port": 587,
                "smtp_password": "hunter2",
                "from": "oxdesk <noreply@test>"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["config"]["smtp_password"], "***");

    // Duplicate name
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/notifications/channels",
        Some(json!({
            "name": "mail",
            "channel_type": "email",
            "config": {"smtp_host": "x", "smtp_port": 25, "from": "y"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1005);

    // Unknown channel type
    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/notifications/channels",
        Some(json!({"name": "pager", "channel_type": "pager", "config": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // min_level bounds
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/notifications/channels/{id}"),
        Some(json!({"min_level": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1103);

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/notifications/channels/{id}"),
        Some(json!({"enabled": true, "min_level": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], true);
    assert_eq!(body["data"]["min_level"], 2);

    // Recipients
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/v1/notifications/channels/{id}/recipients"),
        Some(json!({"value": "oncall@test", "manager_only": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let recipient_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/notifications/channels/{id}")).await;
    assert_eq!(body["data"]["recipients"].as_array().unwrap().len(), 1);

    let (status, _, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/notifications/recipients/{recipient_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) =
        request_no_body(&ctx.app, "DELETE", &format!("/v1/notifications/channels/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/notifications/channels/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn notification_logs_start_empty() {
    let ctx = build_test_context().await.expect("test context should build");
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/notifications/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}
