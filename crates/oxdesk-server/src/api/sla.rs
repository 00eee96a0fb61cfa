use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use oxdesk_sla::escalation::hours_remaining;
use oxdesk_storage::{EscalationEventRow, SlaFilter, SlaRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// SLA tracking record
#[derive(Serialize, ToSchema)]
struct SlaResponse {
    id: String,
    ticket_id: String,
    /// response | resolution
    sla_type: String,
    priority_level: String,
    deadline: DateTime<Utc>,
    /// 0 none, 1 watch, 2 elevated, 3 critical, 4 breach
    escalation_level: u8,
    /// Negative once the deadline has passed
    hours_remaining: f64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SlaResponse {
    fn from_row(row: SlaRow, now: DateTime<Utc>) -> Self {
        Self {
            hours_remaining: hours_remaining(row.deadline, now),
            id: row.id,
            ticket_id: row.ticket_id,
            sla_type: row.sla_type,
            priority_level: row.priority_level,
            deadline: row.deadline,
            escalation_level: row.escalation_level,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escalation audit entry
#[derive(Serialize, ToSchema)]
struct EscalationEventResponse {
    id: String,
    sla_id: String,
    level: u8,
    /// threshold_crossed | deadline_breached
    action: String,
    created_at: DateTime<Utc>,
}

impl From<EscalationEventRow> for EscalationEventResponse {
    fn from(row: EscalationEventRow) -> Self {
        Self {
            id: row.id,
            sla_id: row.sla_id,
            level: row.level,
            action: row.action,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct SlaListParams {
    /// Ticket ID exact match (optional)
    #[param(required = false)]
    #[serde(rename = "ticket_id__eq")]
    ticket_id_eq: Option<String>,
    /// SLA type exact match: response | resolution (optional)
    #[param(required = false)]
    #[serde(rename = "sla_type__eq")]
    sla_type_eq: Option<String>,
    /// Active flag exact match (optional)
    #[param(required = false)]
    #[serde(rename = "active__eq")]
    active_eq: Option<bool>,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    offset: Option<u64>,
}

/// List SLA tracking records, nearest deadline first.
#[utoipa::path(
    get,
    path = "/v1/sla/records",
    tag = "SLA",
    params(SlaListParams),
    responses(
        (status = 200, description = "Paginated SLA record list", body = Vec<SlaResponse>)
    )
)]
async fn list_sla_records(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<SlaListParams>,
) -> impl IntoResponse {
    let filter = SlaFilter {
        ticket_id_eq: params.ticket_id_eq,
        sla_type_eq: params.sla_type_eq,
        active_eq: params.active_eq,
    };
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());

    let total = match state.store.count_slas(&filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count SLA records");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };
    match state.store.list_slas(&filter, limit, offset).await {
        Ok(rows) => {
            let now = Utc::now();
            let items: Vec<SlaResponse> = rows
                .into_iter()
                .map(|r| SlaResponse::from_row(r, now))
                .collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list SLA records");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Escalation history for one SLA record, oldest first.
#[utoipa::path(
    get,
    path = "/v1/sla/records/{id}/history",
    tag = "SLA",
    params(("id" = String, Path, description = "SLA record ID")),
    responses(
        (status = 200, description = "Escalation events", body = Vec<EscalationEventResponse>),
        (status = 404, description = "SLA record not found", body = crate::api::ApiError)
    )
)]
async fn sla_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_sla(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("SLA record '{id}' not found"),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get SLA record");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    match state.store.list_escalation_events(&id).await {
        Ok(rows) => {
            let items: Vec<EscalationEventResponse> = rows.into_iter().map(Into::into).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list escalation events");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn sla_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_sla_records))
        .routes(routes!(sla_history))
}
