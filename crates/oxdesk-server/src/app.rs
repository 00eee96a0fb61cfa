use crate::state::AppState;
use crate::{api, logging};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "oxdesk API",
        description = "oxdesk support ticketing REST API",
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Tickets", description = "Ticket lifecycle and messages"),
        (name = "Queue", description = "Priority scoring and queue estimates"),
        (name = "SLA", description = "SLA tracking and escalation history"),
        (name = "Dashboard", description = "Operations overview"),
        (name = "Customers", description = "Customer accounts"),
        (name = "Agents", description = "Support agents and presence"),
        (name = "Notifications", description = "Notification channel management")
    )
)]
struct ApiDoc;

/// Any-origin by default; an explicit origin list pins it down.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    layer.allow_origin(origins)
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (api_router, api_spec) = api::api_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(api_spec);

    let cors = cors_layer(&state.config.cors_allowed_origins);

    public_router
        .merge(api_router)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/v1/openapi.json", merged_spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
