use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use triage_core::{AuditActor, AuditFilter, AuditRecord};

use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for the audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    /// Filter by ticket ID
    pub ticket_id: Option<String>,
    /// Filter by trace ID (one triage attempt's causal chain)
    pub trace_id: Option<String>,
    /// Filter by action tag
    pub action: Option<String>,
    /// Filter by actor (system | agent | user)
    pub actor: Option<AuditActor>,
    /// Filter entries after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter entries before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of entries to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for the audit query endpoint. Entries are timestamp-ascending.
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub entries: Vec<AuditRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response for audit queries
#[derive(Debug, Serialize)]
pub struct AuditErrorResponse {
    pub error: String,
}

/// Query audit entries
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut base_filter = AuditFilter::new();

    if let Some(ref ticket_id) = params.ticket_id {
        base_filter = base_filter.with_ticket_id(ticket_id);
    }
    if let Some(ref trace_id) = params.trace_id {
        base_filter = base_filter.with_trace_id(trace_id);
    }
    if let Some(ref action) = params.action {
        base_filter = base_filter.with_action(action);
    }
    if let Some(actor) = params.actor {
        base_filter = base_filter.with_actor(actor);
    }
    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = AuditFilter {
        limit,
        offset,
        ..base_filter.clone()
    };

    let entries = match state.audit_store().query(&query_filter) {
        Ok(entries) => entries,
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuditErrorResponse {
                    error: format!("Failed to query audit entries: {}", e),
                }),
            ));
        }
    };

    let total = match state.audit_store().count(&base_filter) {
        Ok(count) => count,
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuditErrorResponse {
                    error: format!("Failed to count audit entries: {}", e),
                }),
            ));
        }
    };

    Ok(Json(AuditQueryResponse {
        entries,
        total,
        limit,
        offset,
    }))
}
