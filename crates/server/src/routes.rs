//! Route configuration.

use crate::handlers;
use crate::metrics::{metrics_handler, register_metrics};
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/organizations/{organization_id}/odk/sync",
            post(handlers::sync_all_kinds),
        )
        .route(
            "/v1/organizations/{organization_id}/odk/{kind}/sync",
            post(handlers::sync_kind),
        )
        .route(
            "/v1/organizations/{organization_id}/attachments/{kind}",
            get(handlers::list_attachments),
        )
        .route(
            "/v1/organizations/{organization_id}/attachments/{kind}/audit",
            get(handlers::audit_attachments),
        );

    let mut router = Router::new().merge(api_routes);

    // Must be network-restricted to the Prometheus scraper when enabled.
    if state.config.server.metrics_enabled {
        register_metrics();
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
