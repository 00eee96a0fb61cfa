use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::queue::QueueEstimateResponse;
use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use oxdesk_common::types::{Priority, SlaType, TicketStatus};
use oxdesk_sla::priority::{calculate, PriorityFactors};
use oxdesk_storage::{MessageRow, SlaFilter, SlaRow, TicketFilter, TicketRow, TicketUpdate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Ticket representation returned by the API
#[derive(Serialize, ToSchema)]
pub struct TicketResponse {
    pub id: String,
    /// Human-facing sequential number, e.g. TKT-000042
    pub ticket_number: String,
    pub subject: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// low | medium | high | urgent
    pub priority: String,
    /// open | in_progress | resolved | closed
    pub status: String,
    pub customer_id: Option<String>,
    pub agent_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<TicketRow> for TicketResponse {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            ticket_number: row.ticket_number,
            subject: row.subject,
            description: row.description,
            category: row.category,
            priority: row.priority,
            status: row.status,
            customer_id: row.customer_id,
            agent_id: row.agent_id,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
            resolved_at: row.resolved_at,
            closed_at: row.closed_at,
        }
    }
}

/// Factor scores for the priority calculator, each in [0, 5]
#[derive(Deserialize, ToSchema)]
pub struct FactorScores {
    pub business_impact: f64,
    pub customer_value: f64,
    pub urgency: f64,
    pub complexity: f64,
    pub resource_availability: f64,
    pub sla_risk: f64,
}

impl FactorScores {
    pub fn to_factors(&self) -> PriorityFactors {
        PriorityFactors {
            business_impact: self.business_impact,
            customer_value: self.customer_value,
            urgency: self.urgency,
            complexity: self.complexity,
            resource_availability: self.resource_availability,
            sla_risk: self.sla_risk,
        }
    }
}

/// Ticket creation request
#[derive(Deserialize, ToSchema)]
struct CreateTicketRequest {
    subject: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    /// Explicit priority; ignored when `factors` is present
    #[serde(default)]
    priority: Option<String>,
    /// Factor scores; when present the calculator decides the priority
    #[serde(default)]
    factors: Option<FactorScores>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Response to ticket creation: the ticket, its queue estimate, and the
/// priority score when the calculator was used
#[derive(Serialize, ToSchema)]
struct TicketCreatedResponse {
    ticket: TicketResponse,
    queue: QueueEstimateResponse,
    /// Present only when factor scores drove the priority
    #[serde(skip_serializing_if = "Option::is_none")]
    priority_score: Option<crate::api::queue::PriorityScoreResponse>,
}

fn parse_priority(trace_id: &str, raw: &str) -> Result<Priority, Response> {
    raw.parse().map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            trace_id,
            "invalid_priority",
            &format!("Unknown priority '{raw}', expected low|medium|high|urgent"),
        )
    })
}

fn storage_error(trace_id: &str, context: &str, e: impl std::fmt::Display) -> Response {
    tracing::error!(error = %e, "{context}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        trace_id,
        "storage_error",
        "Database error",
    )
}

/// Create and insert the response + resolution SLA tracking rows for a
/// new ticket, with deadlines from the configured policy.
async fn create_sla_tracking(state: &AppState, ticket: &TicketRow, priority: Priority) {
    let (response_hours, resolution_hours) = state
        .config
        .sla
        .deadlines_for(priority, ticket.category.as_deref());
    let now = Utc::now();

    for (sla_type, hours) in [
        (SlaType::Response, response_hours),
        (SlaType::Resolution, resolution_hours),
    ] {
        let row = SlaRow {
            id: oxdesk_common::id::next_id(),
            ticket_id: ticket.id.clone(),
            sla_type: sla_type.to_string(),
            priority_level: priority.to_string(),
            deadline: now + Duration::seconds((hours * 3600.0) as i64),
            escalation_level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = state.store.insert_sla(&row).await {
            tracing::error!(
                ticket = %ticket.ticket_number,
                sla_type = %sla_type,
                error = %e,
                "Failed to create SLA tracking"
            );
        }
    }
}

/// Create a ticket.
/// When factor scores are supplied the priority calculator decides the
/// priority; SLA tracking rows are created from the configured deadlines,
/// and the response includes the ticket's queue estimate.
#[utoipa::path(
    post,
    path = "/v1/tickets",
    tag = "Tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket created", body = TicketCreatedResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError)
    )
)]
async fn create_ticket(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateTicketRequest>,
) -> impl IntoResponse {
    if req.subject.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "subject must not be empty",
        );
    }

    let (priority, priority_score) = match &req.factors {
        Some(scores) => {
            let score = calculate(&scores.to_factors());
            (score.priority, Some(score))
        }
        None => {
            let priority = match req.priority.as_deref() {
                Some(raw) => match parse_priority(&trace_id, raw) {
                    Ok(p) => p,
                    Err(resp) => return resp,
                },
                None => Priority::Medium,
            };
            (priority, None)
        }
    };

    let ticket_number = match state.store.next_ticket_number().await {
        Ok(n) => n,
        Err(e) => return storage_error(&trace_id, "Failed to allocate ticket number", e),
    };

    let now = Utc::now();
    let row = TicketRow {
        id: oxdesk_common::id::next_id(),
        ticket_number,
        subject: req.subject.trim().to_string(),
        description: req.description.clone(),
        category: req.category.clone(),
        priority: priority.to_string(),
        status: TicketStatus::Open.to_string(),
        customer_id: req.customer_id.clone(),
        agent_id: req.agent_id.clone(),
        tags: req.tags.clone(),
        created_at: now,
        updated_at: now,
        resolved_at: None,
        closed_at: None,
    };

    // Estimate against the backlog as it stood before this ticket
    let estimate = match crate::api::queue::estimate_for(&state, priority).await {
        Ok(estimate) => estimate,
        Err(e) => return storage_error(&trace_id, "Failed to estimate queue", e),
    };

    let inserted = match state.store.insert_ticket(&row).await {
        Ok(t) => t,
        Err(e) => return storage_error(&trace_id, "Failed to insert ticket", e),
    };

    create_sla_tracking(&state, &inserted, priority).await;

    tracing::info!(
        ticket = %inserted.ticket_number,
        priority = %priority,
        position = estimate.position,
        "Ticket created"
    );

    success_response(
        StatusCode::CREATED,
        &trace_id,
        TicketCreatedResponse {
            ticket: inserted.into(),
            queue: estimate,
            priority_score: priority_score.map(Into::into),
        },
    )
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct TicketListParams {
    /// Status exact match (optional)
    #[param(required = false)]
    #[serde(rename = "status__eq")]
    status_eq: Option<String>,
    /// Priority exact match (optional)
    #[param(required = false)]
    #[serde(rename = "priority__eq")]
    priority_eq: Option<String>,
    /// Category exact match (optional)
    #[param(required = false)]
    #[serde(rename = "category__eq")]
    category_eq: Option<String>,
    /// Assigned agent ID exact match (optional)
    #[param(required = false)]
    #[serde(rename = "agent_id__eq")]
    agent_id_eq: Option<String>,
    /// Customer ID exact match (optional)
    #[param(required = false)]
    #[serde(rename = "customer_id__eq")]
    customer_id_eq: Option<String>,
    /// Substring search over subject, description, ticket number (optional)
    #[param(required = false)]
    search: Option<String>,
    /// Page size (default 20)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    limit: Option<u64>,
    /// Offset (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    offset: Option<u64>,
}

/// List tickets with filters and pagination.
/// Default sort: `created_at` descending.
#[utoipa::path(
    get,
    path = "/v1/tickets",
    tag = "Tickets",
    params(TicketListParams),
    responses(
        (status = 200, description = "Paginated ticket list", body = Vec<TicketResponse>)
    )
)]
async fn list_tickets(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<TicketListParams>,
) -> impl IntoResponse {
    let filter = TicketFilter {
        status_eq: params.status_eq,
        priority_eq: params.priority_eq,
        category_eq: params.category_eq,
        agent_id_eq: params.agent_id_eq,
        customer_id_eq: params.customer_id_eq,
        search: params.search,
    };
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());

    let total = match state.store.count_tickets(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, "Failed to count tickets", e),
    };
    match state.store.list_tickets(&filter, limit, offset).await {
        Ok(rows) => {
            let items: Vec<TicketResponse> = rows.into_iter().map(Into::into).collect();
            crate::api::success_paginated_response(
                StatusCode::OK,
                &trace_id,
                items,
                total,
                limit,
                offset,
            )
        }
        Err(e) => storage_error(&trace_id, "Failed to list tickets", e),
    }
}

/// Get a ticket by ID or ticket number.
#[utoipa::path(
    get,
    path = "/v1/tickets/{id}",
    tag = "Tickets",
    params(("id" = String, Path, description = "Ticket ID or ticket number")),
    responses(
        (status = 200, description = "Ticket", body = TicketResponse),
        (status = 404, description = "Ticket not found", body = crate::api::ApiError)
    )
)]
async fn get_ticket(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let found = match state.store.get_ticket(&id).await {
        Ok(Some(t)) => Some(t),
        Ok(None) => match state.store.get_ticket_by_number(&id).await {
            Ok(found) => found,
            Err(e) => return storage_error(&trace_id, "Failed to get ticket", e),
        },
        Err(e) => return storage_error(&trace_id, "Failed to get ticket", e),
    };
    match found {
        Some(t) => success_response(StatusCode::OK, &trace_id, TicketResponse::from(t)),
        None => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Ticket '{id}' not found"),
        ),
    }
}

/// Ticket update request; absent fields are left untouched
#[derive(Deserialize, ToSchema)]
struct UpdateTicketRequest {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Update a ticket. Concurrent updates are last-write-wins.
#[utoipa::path(
    put,
    path = "/v1/tickets/{id}",
    tag = "Tickets",
    params(("id" = String, Path, description = "Ticket ID")),
    request_body = UpdateTicketRequest,
    responses(
        (status = 200, description = "Updated ticket", body = TicketResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError),
        (status = 404, description = "Ticket not found", body = crate::api::ApiError)
    )
)]
async fn update_ticket(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTicketRequest>,
) -> impl IntoResponse {
    if let Some(raw) = req.priority.as_deref() {
        if let Err(resp) = parse_priority(&trace_id, raw) {
            return resp;
        }
    }
    if let Some(subject) = &req.subject {
        if subject.trim().is_empty() {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                "subject must not be empty",
            );
        }
    }

    let update = TicketUpdate {
        subject: req.subject,
        description: req.description,
        category: req.category,
        priority: req.priority,
        agent_id: req.agent_id,
        tags: req.tags,
    };
    match state.store.update_ticket(&id, &update).await {
        Ok(Some(t)) => success_response(StatusCode::OK, &trace_id, TicketResponse::from(t)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Ticket '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to update ticket", e),
    }
}

/// Delete a ticket.
#[utoipa::path(
    delete,
    path = "/v1/tickets/{id}",
    tag = "Tickets",
    params(("id" = String, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket deleted"),
        (status = 404, description = "Ticket not found", body = crate::api::ApiError)
    )
)]
async fn delete_ticket(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_ticket(&id).await {
        Ok(true) => {
            // orphaned tracking rows would keep escalating
            if let Err(e) = state.store.deactivate_slas_for_ticket(&id).await {
                tracing::error!(ticket_id = %id, error = %e, "Failed to deactivate SLA tracking");
            }
            success_empty_response(StatusCode::OK, &trace_id, "Ticket deleted")
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Ticket '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to delete ticket", e),
    }
}

/// Status change request
#[derive(Deserialize, ToSchema)]
struct StatusRequest {
    /// open | in_progress | resolved | closed
    status: String,
}

/// Change a ticket's status.
/// Resolving or closing deactivates the ticket's SLA tracking; reopening
/// clears the resolution timestamps (tracking is not re-created).
#[utoipa::path(
    put,
    path = "/v1/tickets/{id}/status",
    tag = "Tickets",
    params(("id" = String, Path, description = "Ticket ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Updated ticket", body = TicketResponse),
        (status = 400, description = "Invalid status", body = crate::api::ApiError),
        (status = 404, description = "Ticket not found", body = crate::api::ApiError)
    )
)]
async fn set_status(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> impl IntoResponse {
    let status: TicketStatus = match req.status.parse() {
        Ok(s) => s,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "invalid_status",
                &format!(
                    "Unknown status '{}', expected open|in_progress|resolved|closed",
                    req.status
                ),
            )
        }
    };

    match state.store.set_ticket_status(&id, status).await {
        Ok(Some(t)) => {
            if !status.is_unresolved() {
                if let Err(e) = state.store.deactivate_slas_for_ticket(&id).await {
                    tracing::error!(ticket_id = %id, error = %e, "Failed to deactivate SLA tracking");
                }
            }
            success_response(StatusCode::OK, &trace_id, TicketResponse::from(t))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Ticket '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to set ticket status", e),
    }
}

/// Assignment request
#[derive(Deserialize, ToSchema)]
struct AssignRequest {
    agent_id: String,
}

/// Assign a ticket to an agent.
#[utoipa::path(
    put,
    path = "/v1/tickets/{id}/assign",
    tag = "Tickets",
    params(("id" = String, Path, description = "Ticket ID")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Updated ticket", body = TicketResponse),
        (status = 404, description = "Ticket or agent not found", body = crate::api::ApiError)
    )
)]
async fn assign_ticket(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> impl IntoResponse {
    match state.store.get_agent(&req.agent_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Agent '{}' not found", req.agent_id),
            )
        }
        Err(e) => return storage_error(&trace_id, "Failed to look up agent", e),
    }

    match state.store.assign_ticket(&id, &req.agent_id).await {
        Ok(Some(t)) => success_response(StatusCode::OK, &trace_id, TicketResponse::from(t)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Ticket '{id}' not found"),
        ),
        Err(e) => storage_error(&trace_id, "Failed to assign ticket", e),
    }
}

/// Ticket message representation
#[derive(Serialize, ToSchema)]
struct MessageResponse {
    id: String,
    ticket_id: String,
    /// customer | agent
    author_type: String,
    author_id: Option<String>,
    body: String,
    /// Agent-only note, hidden from the customer
    internal: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            ticket_id: row.ticket_id,
            author_type: row.author_type,
            author_id: row.author_id,
            body: row.body,
            internal: row.internal,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct MessageListParams {
    /// Include internal agent notes (default false)
    #[param(required = false)]
    #[serde(default)]
    include_internal: bool,
}

/// List a ticket's messages, oldest first.
#[utoipa::path(
    get,
    path = "/v1/tickets/{id}/messages",
    tag = "Tickets",
    params(
        ("id" = String, Path, description = "Ticket ID"),
        MessageListParams
    ),
    responses(
        (status = 200, description = "Message list", body = Vec<MessageResponse>),
        (status = 404, description = "Ticket not found", body = crate::api::ApiError)
    )
)]
async fn list_messages(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<MessageListParams>,
) -> impl IntoResponse {
    match state.store.get_ticket(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Ticket '{id}' not found"),
            )
        }
        Err(e) => return storage_error(&trace_id, "Failed to get ticket", e),
    }

    match state.store.list_messages(&id, params.include_internal).await {
        Ok(rows) => {
            let items: Vec<MessageResponse> = rows.into_iter().map(Into::into).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => storage_error(&trace_id, "Failed to list messages", e),
    }
}

/// Message creation request
#[derive(Deserialize, ToSchema)]
struct CreateMessageRequest {
    /// customer | agent
    author_type: String,
    #[serde(default)]
    author_id: Option<String>,
    body: String,
    /// Agent-only note (default false)
    #[serde(default)]
    internal: bool,
}

/// Post a message on a ticket.
/// The first public agent reply completes the ticket's response SLA.
#[utoipa::path(
    post,
    path = "/v1/tickets/{id}/messages",
    tag = "Tickets",
    params(("id" = String, Path, description = "Ticket ID")),
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError),
        (status = 404, description = "Ticket not found", body = crate::api::ApiError)
    )
)]
async fn create_message(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateMessageRequest>,
) -> impl IntoResponse {
    if !matches!(req.author_type.as_str(), "customer" | "agent") {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            &format!(
                "Unknown author_type '{}', expected customer|agent",
                req.author_type
            ),
        );
    }
    if req.body.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "body must not be empty",
        );
    }

    match state.store.get_ticket(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Ticket '{id}' not found"),
            )
        }
        Err(e) => return storage_error(&trace_id, "Failed to get ticket", e),
    }

    let row = MessageRow {
        id: oxdesk_common::id::next_id(),
        ticket_id: id.clone(),
        author_type: req.author_type.clone(),
        author_id: req.author_id.clone(),
        body: req.body.clone(),
        internal: req.internal,
        created_at: Utc::now(),
    };
    let inserted = match state.store.insert_message(&row).await {
        Ok(m) => m,
        Err(e) => return storage_error(&trace_id, "Failed to insert message", e),
    };

    // A public agent reply satisfies the response SLA
    if req.author_type == "agent" && !req.internal {
        let filter = SlaFilter {
            ticket_id_eq: Some(id.clone()),
            sla_type_eq: Some(SlaType::Response.to_string()),
            active_eq: Some(true),
        };
        match state.store.list_slas(&filter, 10, 0).await {
            Ok(rows) => {
                for sla in rows {
                    if let Err(e) = state.store.deactivate_sla(&sla.id).await {
                        tracing::error!(sla_id = %sla.id, error = %e, "Failed to complete response SLA");
                    } else {
                        tracing::info!(ticket_id = %id, sla_id = %sla.id, "Response SLA completed");
                    }
                }
            }
            Err(e) => {
                tracing::error!(ticket_id = %id, error = %e, "Failed to query response SLA");
            }
        }
    }

    success_response(
        StatusCode::CREATED,
        &trace_id,
        MessageResponse::from(inserted),
    )
}

pub fn ticket_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_ticket, list_tickets))
        .routes(routes!(get_ticket, update_ticket, delete_ticket))
        .routes(routes!(set_status))
        .routes(routes!(assign_ticket))
        .routes(routes!(list_messages, create_message))
}
