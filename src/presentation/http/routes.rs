//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};

use super::handlers::{self, partner, task_actions};
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v2", api_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v2 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/projects", task_action_routes(state.clone()))
        .merge(partner_routes(state))
}

/// Task action routes (protected)
fn task_action_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/{project_id}/tasks/actions/lock-for-mapping/{task_id}/",
            post(task_actions::lock_for_mapping),
        )
        .route(
            "/{project_id}/tasks/actions/stop-mapping/{task_id}/",
            post(task_actions::stop_mapping),
        )
        .route(
            "/{project_id}/tasks/actions/unlock-after-mapping/{task_id}/",
            post(task_actions::unlock_after_mapping),
        )
        .route(
            "/{project_id}/tasks/actions/undo-last-action/{task_id}/",
            post(task_actions::undo_last_action),
        )
        .route(
            "/{project_id}/tasks/actions/lock-for-validation/",
            post(task_actions::lock_for_validation),
        )
        .route(
            "/{project_id}/tasks/actions/stop-validation/",
            post(task_actions::stop_validation),
        )
        .route(
            "/{project_id}/tasks/actions/unlock-after-validation/",
            post(task_actions::unlock_after_validation),
        )
        .route("/{project_id}/tasks/actions/map-all/", post(task_actions::map_all))
        .route(
            "/{project_id}/tasks/actions/validate-all/",
            post(task_actions::validate_all),
        )
        .route(
            "/{project_id}/tasks/actions/invalidate-all/",
            post(task_actions::invalidate_all),
        )
        .route(
            "/{project_id}/tasks/actions/reset-all-badimagery/",
            post(task_actions::reset_all_badimagery),
        )
        .route("/{project_id}/tasks/actions/reset-all/", post(task_actions::reset_all))
        .route(
            "/{project_id}/tasks/{task_id}/actions/split/",
            post(task_actions::split),
        )
        .route(
            "/{project_id}/tasks/actions/extend/",
            post(task_actions::extend_lock_time),
        )
        .route(
            "/{project_id}/tasks/actions/reset-by-user/",
            post(task_actions::reset_by_user),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Partner routes (reads public, writes protected)
fn partner_routes(state: AppState) -> Router<AppState> {
    let writes = Router::new()
        .route("/partners/", post(partner::create_partner))
        .route(
            "/partners/{partner}/",
            put(partner::update_partner).delete(partner::delete_partner),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/partners/", get(partner::list_partners))
        .route("/partners/{partner}/", get(partner::get_partner))
        .route(
            "/partners/{partner}/permalink/",
            get(partner::get_partner_by_permalink),
        )
        .merge(writes)
}
