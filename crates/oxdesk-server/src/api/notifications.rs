use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::{error_response, success_empty_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxdesk_common::types::{EscalationLevel, EscalationNotice, Priority, SlaType};
use oxdesk_storage::{
    ChannelFilter, ChannelRow, ChannelUpdate, NotificationLogFilter, NotificationLogRow,
    RecipientRow,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Notification channel, config redacted
#[derive(Serialize, ToSchema)]
struct ChannelResponse {
    id: String,
    name: String,
    /// email | webhook
    channel_type: String,
    description: Option<String>,
    /// Lowest escalation level this channel fires at (1-4)
    min_level: u8,
    enabled: bool,
    /// Channel config with secrets masked
    config: Value,
    recipients: Vec<RecipientResponse>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Configured recipient on a channel
#[derive(Serialize, ToSchema)]
struct RecipientResponse {
    id: String,
    value: String,
    /// Included only when the notice level notifies managers
    manager_only: bool,
}

impl From<RecipientRow> for RecipientResponse {
    fn from(row: RecipientRow) -> Self {
        Self {
            id: row.id,
            value: row.value,
            manager_only: row.manager_only,
        }
    }
}

fn to_channel_response(
    state: &AppState,
    row: ChannelRow,
    recipients: Vec<RecipientRow>,
) -> ChannelResponse {
    let config = match state.notifier.registry().get_plugin(&row.channel_type) {
        Some(plugin) => plugin.redact_config(&row.config),
        None => row.config.clone(),
    };
    ChannelResponse {
        id: row.id,
        name: row.name,
        channel_type: row.channel_type,
        description: row.description,
        min_level: row.min_level,
        enabled: row.enabled,
        config,
        recipients: recipients.into_iter().map(Into::into).collect(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn storage_error(trace_id: &str, context: &str, e: impl std::fmt::Display) -> axum::response::Response {
    tracing::error!(error = %e, "{context}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        trace_id,
        "storage_error",
        "Database error",
    )
}

/// Channel creation request
#[derive(Deserialize, ToSchema)]
struct CreateChannelRequest {
    name: String,
    /// email | webhook
    channel_type: String,
    #[serde(default)]
    description: Option<String>,
    /// Lowest escalation level this channel fires at (default 1)
    #[serde(default = "default_min_level")]
    min_level: u8,
    #[serde(default)]
    enabled: bool,
    /// Plugin-specific config blob
    #[serde(default = "default_config")]
    config: Value,
}

fn default_min_level() -> u8 {
    1
}

fn default_config() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Create a notification channel.
/// The config is validated by the matching plugin before it is stored.
#[utoipa::path(
    post,
    path = "/v1/notifications/channels",
    tag = "Notifications",
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = ChannelResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError),
        (status = 409, description = "Name already taken", body = crate::api::ApiError)
    )
)]
async fn create_channel(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateChannelRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "name must not be empty",
        );
    }
    if !(1..=4).contains(&req.min_level) {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "invalid_level",
            "min_level must be between 1 and 4",
        );
    }
    let plugin = match state.notifier.registry().get_plugin(&req.channel_type) {
        Some(p) => p,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                &format!("Unknown channel type '{}'", req.channel_type),
            )
        }
    };
    if let Err(e) = plugin.validate_config(&req.config) {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "invalid_config",
            &e.to_string(),
        );
    }

    match state.store.get_channel_by_name(&req.name).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                &trace_id,
                "conflict",
                &format!("Channel '{}' already exists", req.name),
            )
        }
        Ok(None) => {}
        Err(e) => return storage_error(&trace_id, "Failed to look up channel", e),
    }

    let now = Utc::now();
    let row = ChannelRow {
        id: oxdesk_common::id::next_id(),
        name: req.name.trim().to_string(),
        channel_type: req.channel_type,
        description: req.description,
        min_level: req.min_level,
        enabled: req.enabled,
        config: req.config,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_channel(&row).await {
        Ok(c) => success_response(
            StatusCode::CREATED,
            &trace_id,
            to_channel_response(&state, c, Vec::new()),
        ),
        Err(e) => storage_error(&trace_id, "Failed to insert channel", e),
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ChannelListParams {
    /// Channel type exact match (optional)
    #[param(required = false)]
    #[serde(rename = "channel_type__eq")]
    channel_type_eq: Option<String>,
    /// Enabled flag exact match (optional)
    #[param(required = false)]
    #[serde(rename = "enabled__eq")]
    enabled_eq: Option<bool>,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    offset: Option<u64>,
}

/// List notification channels by name.
#[utoipa::path(
    get,
    path = "/v1/notifications/channels",
    tag = "Notifications",
    params(ChannelListParams),
    responses(
        (status = 200, description = "Paginated channel list", body = Vec<ChannelResponse>)
    )
)]
async fn list_channels(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ChannelListParams>,
) -> impl IntoResponse {
    let filter = ChannelFilter {
        channel_type_eq: params.channel_type_eq,
        enabled_eq: params.enabled_eq,
    };
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());

    let result: anyhow::Result<(Vec<ChannelResponse>, u64)> = async {
        let total = state.store.count_channels(&filter).await?;
        let rows = state.store.list_channels(&filter, limit, offset).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let recipients = state.store.list_recipients(&row.id).await?;
            items.push(to_channel_response(&state, row, recipients));
        }
        Ok((items, total))
    }
    .await;

    match result {
        Ok((items, total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => storage_error(&trace_id, "Failed to list channels", e),
    }
}

/// Get a notification channel.
#[utoipa::path(
    get,
    path = "/v1/notifications/channels/{id}",
    tag = "Notifications",
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Channel", body = ChannelResponse),
        (status = 404, description = "Channel not found", body = crate::api::ApiError)
    )
)]
async fn get_channel(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let result: anyhow::Result<Option<ChannelResponse>> = async {
        let Some(row) = state.store.get_channel(&id).await? else {
            return Ok(None);
        };
        let recipients = state.store.list_recipients(&row.id).await?;
        Ok(Some(to_channel_response(&state, row, recipients)))
    }
    .await;
    match result {
        Ok(Some(channel)) => success_response(StatusCode::OK, &trace_id, channel),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Channel '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to get channel", e),
    }
}

/// Channel update request; absent fields are left untouched
#[derive(Deserialize, ToSchema)]
struct UpdateChannelRequest {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    min_level: Option<u8>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    config: Option<Value>,
}

/// Update a notification channel.
#[utoipa::path(
    put,
    path = "/v1/notifications/channels/{id}",
    tag = "Notifications",
    params(("id" = String, Path, description = "Channel ID")),
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Updated channel", body = ChannelResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError),
        (status = 404, description = "Channel not found", body = crate::api::ApiError)
    )
)]
async fn update_channel(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateChannelRequest>,
) -> impl IntoResponse {
    if let Some(level) = req.min_level {
        if !(1..=4).contains(&level) {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "invalid_level",
                "min_level must be between 1 and 4",
            );
        }
    }

    if let Some(config) = &req.config {
        let existing = match state.store.get_channel(&id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    &trace_id,
                    "not_found",
                    &format!("Channel '{id}' not found"),
                )
            }
            Err(e) => return storage_error(&trace_id, "Failed to get channel", e),
        };
        if let Some(plugin) = state.notifier.registry().get_plugin(&existing.channel_type) {
            if let Err(e) = plugin.validate_config(config) {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &trace_id,
                    "invalid_config",
                    &e.to_string(),
                );
            }
        }
    }

    let update = ChannelUpdate {
        description: req.description,
        min_level: req.min_level,
        enabled: req.enabled,
        config: req.config,
    };
    let result: anyhow::Result<Option<ChannelResponse>> = async {
        let Some(row) = state.store.update_channel(&id, &update).await? else {
            return Ok(None);
        };
        let recipients = state.store.list_recipients(&row.id).await?;
        Ok(Some(to_channel_response(&state, row, recipients)))
    }
    .await;
    match result {
        Ok(Some(channel)) => success_response(StatusCode::OK, &trace_id, channel),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Channel '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to update channel", e),
    }
}

/// Delete a notification channel and its recipients.
#[utoipa::path(
    delete,
    path = "/v1/notifications/channels/{id}",
    tag = "Notifications",
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Channel deleted"),
        (status = 404, description = "Channel not found", body = crate::api::ApiError)
    )
)]
async fn delete_channel(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_channel(&id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "Channel deleted"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Channel '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to delete channel", e),
    }
}

/// Recipient creation request
#[derive(Deserialize, ToSchema)]
struct CreateRecipientRequest {
    /// Email address or webhook URL, per the channel type
    value: String,
    /// Only notified when the level notifies managers (default false)
    #[serde(default)]
    manager_only: bool,
}

/// Add a recipient to a channel.
#[utoipa::path(
    post,
    path = "/v1/notifications/channels/{id}/recipients",
    tag = "Notifications",
    params(("id" = String, Path, description = "Channel ID")),
    request_body = CreateRecipientRequest,
    responses(
        (status = 201, description = "Recipient added", body = RecipientResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError),
        (status = 404, description = "Channel not found", body = crate::api::ApiError)
    )
)]
async fn create_recipient(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateRecipientRequest>,
) -> impl IntoResponse {
    if req.value.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "value must not be empty",
        );
    }
    match state.store.get_channel(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Channel '{id}' not found"),
            )
        }
        Err(e) => return storage_error(&trace_id, "Failed to get channel", e),
    }

    let row = RecipientRow {
        id: oxdesk_common::id::next_id(),
        channel_id: id,
        value: req.value.trim().to_string(),
        manager_only: req.manager_only,
        created_at: Utc::now(),
    };
    match state.store.insert_recipient(&row).await {
        Ok(r) => success_response(StatusCode::CREATED, &trace_id, RecipientResponse::from(r)),
        Err(e) => storage_error(&trace_id, "Failed to insert recipient", e),
    }
}

/// Remove a recipient.
#[utoipa::path(
    delete,
    path = "/v1/notifications/recipients/{id}",
    tag = "Notifications",
    params(("id" = String, Path, description = "Recipient ID")),
    responses(
        (status = 200, description = "Recipient removed"),
        (status = 404, description = "Recipient not found", body = crate::api::ApiError)
    )
)]
async fn delete_recipient(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_recipient(&id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "Recipient removed"),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Recipient '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to delete recipient", e),
    }
}

/// Send a synthetic escalation notice through one channel.
/// A delivery log row is written like a real escalation.
#[utoipa::path(
    post,
    path = "/v1/notifications/channels/{id}/test",
    tag = "Notifications",
    params(("id" = String, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Test notice dispatched"),
        (status = 404, description = "Channel not found", body = crate::api::ApiError)
    )
)]
async fn test_channel(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let channel = match state.store.get_channel(&id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Channel '{id}' not found"),
            )
        }
        Err(e) => return storage_error(&trace_id, "Failed to get channel", e),
    };

    let now = Utc::now();
    let notice = EscalationNotice {
        id: oxdesk_common::id::next_id(),
        sla_id: "test".to_string(),
        ticket_id: "test".to_string(),
        ticket_number: "TKT-TEST".to_string(),
        subject: format!("Test notice for channel '{}'", channel.name),
        priority: Priority::High,
        sla_type: SlaType::Response,
        level: EscalationLevel::Watch,
        deadline: now + chrono::Duration::hours(1),
        hours_remaining: 1.0,
        message: "This is a test escalation notice.".to_string(),
        agent_email: None,
        created_at: now,
    };
    state.notifier.dispatch_to(&channel, &notice, &[]).await;
    success_empty_response(StatusCode::OK, &trace_id, "Test notice dispatched")
}

/// Delivery log entry
#[derive(Serialize, ToSchema)]
struct NotificationLogResponse {
    id: String,
    ticket_id: String,
    channel_id: String,
    channel_name: String,
    channel_type: String,
    level: u8,
    /// sent | partial | failed
    status: String,
    error_message: Option<String>,
    duration_ms: u64,
    recipient_count: u32,
    created_at: DateTime<Utc>,
}

impl From<NotificationLogRow> for NotificationLogResponse {
    fn from(row: NotificationLogRow) -> Self {
        Self {
            id: row.id,
            ticket_id: row.ticket_id,
            channel_id: row.channel_id,
            channel_name: row.channel_name,
            channel_type: row.channel_type,
            level: row.level,
            status: row.status,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
            recipient_count: row.recipient_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct LogListParams {
    /// Ticket ID exact match (optional)
    #[param(required = false)]
    #[serde(rename = "ticket_id__eq")]
    ticket_id_eq: Option<String>,
    /// Channel ID exact match (optional)
    #[param(required = false)]
    #[serde(rename = "channel_id__eq")]
    channel_id_eq: Option<String>,
    /// Status exact match: sent | partial | failed (optional)
    #[param(required = false)]
    #[serde(rename = "status__eq")]
    status_eq: Option<String>,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    offset: Option<u64>,
}

/// List notification delivery logs, newest first.
#[utoipa::path(
    get,
    path = "/v1/notifications/logs",
    tag = "Notifications",
    params(LogListParams),
    responses(
        (status = 200, description = "Paginated delivery log", body = Vec<NotificationLogResponse>)
    )
)]
async fn list_logs(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<LogListParams>,
) -> impl IntoResponse {
    let filter = NotificationLogFilter {
        ticket_id_eq: params.ticket_id_eq,
        channel_id_eq: params.channel_id_eq,
        status_eq: params.status_eq,
    };
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());

    let result: anyhow::Result<(Vec<NotificationLogResponse>, u64)> = async {
        let total = state.store.count_notification_logs(&filter).await?;
        let rows = state
            .store
            .list_notification_logs(&filter, limit, offset)
            .await?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
    .await;
    match result {
        Ok((items, total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => storage_error(&trace_id, "Failed to list notification logs", e),
    }
}

pub fn notification_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_channel, list_channels))
        .routes(routes!(get_channel, update_channel, delete_channel))
        .routes(routes!(create_recipient))
        .routes(routes!(delete_recipient))
        .routes(routes!(test_channel))
        .routes(routes!(list_logs))
}
