use crate::api::tickets::FactorScores;
use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use oxdesk_common::types::Priority;
use oxdesk_sla::priority::{calculate, PriorityScore};
use oxdesk_sla::queue::{self, QueueEstimate, RESOLVED_SAMPLE_SIZE};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Priority calculation result
#[derive(Serialize, ToSchema)]
pub struct PriorityScoreResponse {
    /// Weighted score in [0, 5]
    pub final_score: f64,
    /// low | medium | high | urgent | critical
    pub band: String,
    /// The band collapsed onto the ticket scale: low | medium | high | urgent
    pub priority: String,
    /// Heuristic confidence percentage in [55, 100]
    pub confidence: u8,
}

impl From<PriorityScore> for PriorityScoreResponse {
    fn from(score: PriorityScore) -> Self {
        Self {
            final_score: score.final_score,
            band: score.band.to_string(),
            priority: score.priority.to_string(),
            confidence: score.confidence,
        }
    }
}

/// Queue position and wait estimate
#[derive(Serialize, ToSchema)]
pub struct QueueEstimateResponse {
    /// 1-based rank among unresolved tickets
    pub position: usize,
    pub estimated_wait_hours: f64,
    /// Historical average the estimate was scaled from
    pub average_resolution_hours: f64,
    /// Agents online when the estimate was made
    pub online_agents: usize,
}

/// Build a queue estimate for a would-be ticket of the given priority from
/// the open-ticket cache, recent resolution history, and agent presence.
pub async fn estimate_for(state: &AppState, candidate: Priority) -> anyhow::Result<QueueEstimateResponse> {
    let open = state.open_tickets.get().await?;
    let history = state
        .store
        .recent_resolution_hours(RESOLVED_SAMPLE_SIZE)
        .await?;
    let online = state.store.count_online_agents().await? as usize;
    let QueueEstimate {
        position,
        estimated_wait_hours,
        average_resolution_hours,
    } = queue::estimate(&open, candidate, &history, online);
    Ok(QueueEstimateResponse {
        position,
        estimated_wait_hours,
        average_resolution_hours,
        online_agents: online,
    })
}

/// Score a set of priority factors.
/// Pure calculation, nothing is stored.
#[utoipa::path(
    post,
    path = "/v1/priority/score",
    tag = "Queue",
    request_body = FactorScores,
    responses(
        (status = 200, description = "Priority score", body = PriorityScoreResponse)
    )
)]
async fn score_priority(
    Extension(trace_id): Extension<TraceId>,
    Json(req): Json<FactorScores>,
) -> impl IntoResponse {
    let score = calculate(&req.to_factors());
    success_response(
        StatusCode::OK,
        &trace_id,
        PriorityScoreResponse::from(score),
    )
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct EstimateParams {
    /// Priority of the would-be ticket: low | medium | high | urgent
    priority: String,
}

/// Estimate queue position and wait for a new ticket of the given priority.
#[utoipa::path(
    get,
    path = "/v1/queue/estimate",
    tag = "Queue",
    params(EstimateParams),
    responses(
        (status = 200, description = "Queue estimate", body = QueueEstimateResponse),
        (status = 400, description = "Invalid priority", body = crate::api::ApiError)
    )
)]
async fn queue_estimate(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<EstimateParams>,
) -> impl IntoResponse {
    let candidate: Priority = match params.priority.parse() {
        Ok(p) => p,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "invalid_priority",
                &format!(
                    "Unknown priority '{}', expected low|medium|high|urgent",
                    params.priority
                ),
            )
        }
    };
    match estimate_for(&state, candidate).await {
        Ok(estimate) => success_response(StatusCode::OK, &trace_id, estimate),
        Err(e) => {
            tracing::error!(error = %e, "Failed to estimate queue");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn queue_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(score_priority))
        .routes(routes!(queue_estimate))
}
