use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// All dashboard routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard_summary))
        .route("/set-schedule", post(handlers::set_schedule))
        .route("/run-script-stream", get(handlers::trigger_run))
        .route("/events", get(handlers::sync_events_sse))
        .route("/runs", get(handlers::recent_runs))
        .route("/logs", get(handlers::raw_logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
