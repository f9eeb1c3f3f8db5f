use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{audit, handlers, policy, tickets, triage};
use crate::metrics;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Tickets
        .route("/tickets", post(tickets::create_ticket))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}", delete(tickets::delete_ticket))
        .route("/tickets/{id}/replies", post(tickets::reply_to_ticket))
        .route("/tickets/{id}/suggestions", get(tickets::list_suggestions))
        .route("/tickets/{id}/assign", post(tickets::assign_ticket))
        .route("/tickets/{id}/retriage", post(tickets::retriage_ticket))
        // Policy
        .route("/policy", get(policy::get_policy))
        .route("/policy", put(policy::update_policy))
        // Triage runner
        .route("/triage/status", get(triage::get_status))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
