use crate::api::pagination::PaginationParams;
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxdesk_storage::CustomerRow;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const TIERS: [&str; 4] = ["free", "standard", "premium", "enterprise"];

/// Customer account
#[derive(Serialize, ToSchema)]
struct CustomerResponse {
    id: String,
    name: String,
    email: String,
    /// free | standard | premium | enterprise
    tier: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for CustomerResponse {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            tier: row.tier,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Customer creation request
#[derive(Deserialize, ToSchema)]
struct CreateCustomerRequest {
    name: String,
    email: String,
    /// Defaults to standard
    #[serde(default)]
    tier: Option<String>,
}

fn validate_tier(trace_id: &str, tier: &str) -> Option<axum::response::Response> {
    if TIERS.contains(&tier) {
        return None;
    }
    Some(error_response(
        StatusCode::BAD_REQUEST,
        trace_id,
        "bad_request",
        &format!("Unknown tier '{tier}', expected free|standard|premium|enterprise"),
    ))
}

/// Register a customer. Email addresses are unique.
#[utoipa::path(
    post,
    path = "/v1/customers",
    tag = "Customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = CustomerResponse),
        (status = 400, description = "Invalid request", body = crate::api::ApiError),
        (status = 409, description = "Email already registered", body = crate::api::ApiError)
    )
)]
async fn create_customer(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateCustomerRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() || !req.email.contains('@') {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "name must not be empty and email must be an address",
        );
    }
    let tier = req.tier.unwrap_or_else(|| "standard".to_string());
    if let Some(resp) = validate_tier(&trace_id, &tier) {
        return resp;
    }

    match state.store.get_customer_by_email(&req.email).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                &trace_id,
                "conflict",
                &format!("Customer with email '{}' already exists", req.email),
            )
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up customer");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    }

    let now = Utc::now();
    let row = CustomerRow {
        id: oxdesk_common::id::next_id(),
        name: req.name.trim().to_string(),
        email: req.email.clone(),
        tier,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_customer(&row).await {
        Ok(c) => success_response(StatusCode::CREATED, &trace_id, CustomerResponse::from(c)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to insert customer");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// List customers, newest first.
#[utoipa::path(
    get,
    path = "/v1/customers",
    tag = "Customers",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated customer list", body = Vec<CustomerResponse>)
    )
)]
async fn list_customers(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (page.limit(), page.offset());
    let result: anyhow::Result<(Vec<CustomerRow>, u64)> = async {
        let total = state.store.count_customers().await?;
        let rows = state.store.list_customers(limit, offset).await?;
        Ok((rows, total))
    }
    .await;
    match result {
        Ok((rows, total)) => {
            let items: Vec<CustomerResponse> = rows.into_iter().map(Into::into).collect();
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list customers");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Get a customer.
#[utoipa::path(
    get,
    path = "/v1/customers/{id}",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer", body = CustomerResponse),
        (status = 404, description = "Customer not found", body = crate::api::ApiError)
    )
)]
async fn get_customer(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_customer(&id).await {
        Ok(Some(c)) => success_response(StatusCode::OK, &trace_id, CustomerResponse::from(c)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Customer '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get customer");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Tier change request
#[derive(Deserialize, ToSchema)]
struct TierRequest {
    /// free | standard | premium | enterprise
    tier: String,
}

/// Change a customer's tier.
/// The tier feeds the customer_value factor in priority scoring.
#[utoipa::path(
    put,
    path = "/v1/customers/{id}/tier",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    request_body = TierRequest,
    responses(
        (status = 200, description = "Updated customer", body = CustomerResponse),
        (status = 400, description = "Invalid tier", body = crate::api::ApiError),
        (status = 404, description = "Customer not found", body = crate::api::ApiError)
    )
)]
async fn set_customer_tier(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TierRequest>,
) -> impl IntoResponse {
    if let Some(resp) = validate_tier(&trace_id, &req.tier) {
        return resp;
    }
    match state.store.update_customer_tier(&id, &req.tier).await {
        Ok(Some(c)) => success_response(StatusCode::OK, &trace_id, CustomerResponse::from(c)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Customer '{id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update customer tier");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn customer_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_customer, list_customers))
        .routes(routes!(get_customer))
        .routes(routes!(set_customer_tier))
}
