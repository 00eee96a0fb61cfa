use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use oxdesk_sla::queue::{average_resolution_hours, RESOLVED_SAMPLE_SIZE};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Ticket counts by status
#[derive(Serialize, ToSchema)]
struct TicketCounts {
    total: u64,
    open: u64,
    in_progress: u64,
    resolved: u64,
    closed: u64,
}

/// Aggregate view for the operations dashboard
#[derive(Serialize, ToSchema)]
struct DashboardSummary {
    tickets: TicketCounts,
    /// (priority, count) pairs over all tickets
    by_priority: Vec<(String, u64)>,
    /// Average hours to resolve, over the recent history
    average_resolution_hours: f64,
    /// Active SLA records being tracked
    active_slas: u64,
    /// Active SLA records past their deadline
    breached_slas: u64,
    online_agents: u64,
}

/// Aggregate ticket and SLA numbers for the dashboard.
#[utoipa::path(
    get,
    path = "/v1/dashboard/summary",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary)
    )
)]
async fn dashboard_summary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let result: anyhow::Result<DashboardSummary> = async {
        let stats = state.store.ticket_stats().await?;
        let history = state
            .store
            .recent_resolution_hours(RESOLVED_SAMPLE_SIZE)
            .await?;
        let active = state.store.list_active_slas().await?;
        let now = Utc::now();
        let breached = active.iter().filter(|s| s.deadline < now).count() as u64;
        let online_agents = state.store.count_online_agents().await?;
        Ok(DashboardSummary {
            tickets: TicketCounts {
                total: stats.total,
                open: stats.open,
                in_progress: stats.in_progress,
                resolved: stats.resolved,
                closed: stats.closed,
            },
            by_priority: stats.by_priority,
            average_resolution_hours: average_resolution_hours(&history),
            active_slas: active.len() as u64,
            breached_slas: breached,
            online_agents,
        })
    }
    .await;

    match result {
        Ok(summary) => success_response(StatusCode::OK, &trace_id, summary),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build dashboard summary");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(dashboard_summary))
}
