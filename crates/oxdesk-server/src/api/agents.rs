use crate::api::pagination::PaginationParams;
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxdesk_storage::AgentRow;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Support agent
#[derive(Serialize, ToSchema)]
struct AgentResponse {
    id: String,
    name: String,
    email: String,
    /// agent | manager
    role: String,
    online: bool,
    last_seen: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AgentRow> for AgentResponse {
    fn from(row: AgentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            online: row.online,
            last_seen: row.last_seen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Agent creation request
#[derive(Deserialize, ToSchema)]
struct CreateAgentRequest {
    name: String,
    email: String,
    /// agent | manager (default agent)
    #[serde(default)]
    role: Option<String>,
}

/// Register an agent. Managers additionally receive level >= 3 escalations.
#[utoipa::path(
    post,
    path = "/v1/agents",
    tag = "Agents",
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "Agent created", body = AgentResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError)
    )
)]
async fn create_agent(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateAgentRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() || !req.email.contains('@') {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "name must not be empty and email must be an address",
        );
    }
    let role = req.role.unwrap_or_else(|| "agent".to_string());
    if !matches!(role.as_str(), "agent" | "manager") {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            &format!("Unknown role '{role}', expected agent|manager"),
        );
    }

    let now = Utc::now();
    let row = AgentRow {
        id: oxdesk_common::id::next_id(),
        name: req.name.trim().to_string(),
        email: req.email.clone(),
        role,
        online: false,
        last_seen: None,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_agent(&row).await {
        Ok(a) => success_response(StatusCode::CREATED, &trace_id, AgentResponse::from(a)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to insert agent");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// List agents by name.
#[utoipa::path(
    get,
    path = "/v1/agents",
    tag = "Agents",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated agent list", body = Vec<AgentResponse>)
    )
)]
async fn list_agents(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (page.limit(), page.offset());
    let result: anyhow::Result<(Vec<AgentRow>, u64)> = async {
        let total = state.store.count_agents().await?;
        let rows = state.store.list_agents(limit, offset).await?;
        Ok((rows, total))
    }
    .await;
    match result {
        Ok((rows, total)) => {
            let items: Vec<AgentResponse> = rows.into_iter().map(Into::into).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list agents");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Get an agent.
#[utoipa::path(
    get,
    path = "/v1/agents/{id}",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Agent", body = AgentResponse),
        (status = 404, description = "Agent not found", body = crate::api::ApiError)
    )
)]
async fn get_agent(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_agent(&id).await {
        Ok(Some(a)) => success_response(StatusCode::OK, &trace_id, AgentResponse::from(a)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Agent '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get agent");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Presence change request
#[derive(Deserialize, ToSchema)]
struct PresenceRequest {
    online: bool,
}

/// Flip an agent's presence.
/// The online agent count scales queue wait estimates.
#[utoipa::path(
    put,
    path = "/v1/agents/{id}/presence",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent ID")),
    request_body = PresenceRequest,
    responses(
        (status = 200, description = "Updated agent", body = AgentResponse),
        (status = 404, description = "Agent not found", body = crate::api::ApiError)
    )
)]
async fn set_presence(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PresenceRequest>,
) -> impl IntoResponse {
    match state.store.set_agent_presence(&id, req.online).await {
        Ok(Some(a)) => success_response(StatusCode::OK, &trace_id, AgentResponse::from(a)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Agent '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to set agent presence");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn agent_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_agent, list_agents))
        .routes(routes!(get_agent))
        .routes(routes!(set_presence))
}
