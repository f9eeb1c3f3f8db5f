//! Triage runner status endpoint.

use axum::{extract::State, Json};
use std::sync::Arc;
use triage_core::TriageStatus;

use crate::state::AppState;

/// Get the triage runner's status snapshot
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<TriageStatus> {
    Json(state.runner().status().await)
}
