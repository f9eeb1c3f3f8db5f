//! Policy API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use triage_core::{AuditActor, AuditEvent, PolicyError, PolicyUpdate, TriagePolicy};

use crate::state::AppState;

/// Request body for updating the policy
#[derive(Debug, Deserialize)]
pub struct UpdatePolicyBody {
    #[serde(flatten)]
    pub update: PolicyUpdate,
    /// Operator applying the change, for the audit entry.
    pub updated_by: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct PolicyErrorResponse {
    pub error: String,
}

fn policy_error_response(err: PolicyError) -> (StatusCode, Json<PolicyErrorResponse>) {
    let status = match &err {
        PolicyError::Invalid(_) => StatusCode::BAD_REQUEST,
        PolicyError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(PolicyErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Get the current triage policy (created with defaults if absent)
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TriagePolicy>, impl IntoResponse> {
    match state.policy_store().get() {
        Ok(policy) => Ok(Json(policy)),
        Err(e) => Err(policy_error_response(e)),
    }
}

/// Apply a partial policy update
pub async fn update_policy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdatePolicyBody>,
) -> Result<Json<TriagePolicy>, impl IntoResponse> {
    let policy = match state.policy_store().update(body.update) {
        Ok(policy) => policy,
        Err(e) => return Err(policy_error_response(e)),
    };

    let updated_by = body.updated_by.unwrap_or_else(|| "operator".to_string());
    state
        .audit()
        .emit(
            AuditActor::User,
            None,
            AuditEvent::PolicyUpdated {
                updated_by,
                auto_close_enabled: policy.auto_close_enabled,
                confidence_threshold: policy.confidence_threshold,
                max_retries: policy.max_retries,
            },
        )
        .await;

    Ok(Json(policy))
}
