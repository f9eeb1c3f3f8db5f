//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use triage_core::{
    AuditActor, AuditEvent, CreateTicketRequest, Reply, Ticket, TicketCategory, TicketError,
    TicketFilter, TicketPriority, TicketStatus, TriageError,
};

use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub title: String,
    pub description: String,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    /// User creating the ticket.
    pub created_by: String,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    pub status: Option<TicketStatus>,
    pub category: Option<TicketCategory>,
    pub created_by: Option<String>,
    pub assignee: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for replying to a ticket
#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub author: String,
    pub content: String,
    /// Optional status change applied together with the reply.
    pub change_status: Option<TicketStatus>,
}

/// Request body for assigning a ticket
#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub assignee: String,
    pub assigned_by: String,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
}

/// Response for ticket creation: the ticket plus the trace id of the queued
/// triage attempt.
#[derive(Debug, Serialize)]
pub struct CreatedTicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub trace_id: String,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<TicketErrorResponse>) {
    (
        status,
        Json(TicketErrorResponse {
            error: message.into(),
        }),
    )
}

fn ticket_error_response(err: TicketError) -> (StatusCode, Json<TicketErrorResponse>) {
    let status = match &err {
        TicketError::NotFound(_) => StatusCode::NOT_FOUND,
        TicketError::InvalidTransition { .. } => StatusCode::CONFLICT,
        TicketError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket and queue its triage
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTicketBody>,
) -> Result<(StatusCode, Json<CreatedTicketResponse>), impl IntoResponse> {
    if body.title.len() < 5 || body.title.len() > 200 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "title must be between 5 and 200 characters",
        ));
    }
    if body.description.len() < 10 || body.description.len() > 2000 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "description must be between 10 and 2000 characters",
        ));
    }

    let request = CreateTicketRequest {
        title: body.title,
        description: body.description,
        category: body.category.unwrap_or_default(),
        priority: body.priority.unwrap_or_default(),
        created_by: body.created_by,
    };

    let ticket = match state.ticket_store().create(request) {
        Ok(ticket) => ticket,
        Err(e) => return Err(ticket_error_response(e)),
    };

    let trace_id = uuid::Uuid::new_v4().to_string();

    state
        .audit()
        .emit(
            AuditActor::User,
            Some(&trace_id),
            AuditEvent::TicketCreated {
                ticket_id: ticket.id.clone(),
                created_by: ticket.created_by.clone(),
                title: ticket.title.clone(),
                category: ticket.category,
            },
        )
        .await;

    if let Err(e) = state.queue().enqueue(&ticket.id, &trace_id) {
        // The ticket exists but triage could not be queued; surface that
        // rather than pretending the pipeline will run.
        debug_assert!(matches!(e, TriageError::QueueUnavailable));
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("ticket {} created but triage queue unavailable", ticket.id),
        ));
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatedTicketResponse { ticket, trace_id }),
    ))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    match state.ticket_store().get(&id) {
        Ok(Some(ticket)) => Ok(Json(TicketResponse { ticket })),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Ticket not found: {}", id),
        )),
        Err(e) => Err(ticket_error_response(e)),
    }
}

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::new().with_limit(limit).with_offset(offset);

    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    if let Some(category) = params.category {
        filter = filter.with_category(category);
    }
    if let Some(ref created_by) = params.created_by {
        filter = filter.with_created_by(created_by);
    }
    if let Some(ref assignee) = params.assignee {
        filter = filter.with_assignee(assignee);
    }

    let tickets = match state.ticket_store().list(&filter) {
        Ok(tickets) => tickets,
        Err(e) => return Err(ticket_error_response(e)),
    };

    let count_filter = TicketFilter {
        limit: i64::MAX,
        offset: 0,
        ..filter.clone()
    };

    let total = match state.ticket_store().count(&count_filter) {
        Ok(count) => count,
        Err(e) => return Err(ticket_error_response(e)),
    };

    Ok(Json(ListTicketsResponse {
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Reply to a ticket, optionally changing its status
pub async fn reply_to_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReplyBody>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    if body.content.len() < 5 || body.content.len() > 2000 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "content must be between 5 and 2000 characters",
        ));
    }

    if let Some(status) = body.change_status {
        let allowed = matches!(
            status,
            TicketStatus::Resolved | TicketStatus::Closed | TicketStatus::WaitingHuman
        );
        if !allowed {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "change_status must be one of resolved, closed, waiting_human",
            ));
        }
    }

    let prior = match state.ticket_store().get(&id) {
        Ok(Some(ticket)) => ticket,
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("Ticket not found: {}", id),
            ))
        }
        Err(e) => return Err(ticket_error_response(e)),
    };

    let reply = Reply::from_user(&body.author, &body.content);
    let ticket = match state
        .ticket_store()
        .append_reply(&id, reply, body.change_status)
    {
        Ok(ticket) => ticket,
        Err(e) => return Err(ticket_error_response(e)),
    };

    state
        .audit()
        .emit(
            AuditActor::User,
            None,
            AuditEvent::ReplySent {
                ticket_id: ticket.id.clone(),
                author: Some(body.author.clone()),
                is_agent: false,
            },
        )
        .await;

    if let Some(to_status) = body.change_status {
        if prior.status != to_status {
            state
                .audit()
                .emit(
                    AuditActor::User,
                    None,
                    AuditEvent::StatusChanged {
                        ticket_id: ticket.id.clone(),
                        from_status: prior.status,
                        to_status,
                        reason: Some(format!("reply by {}", body.author)),
                    },
                )
                .await;
        }
    }

    Ok(Json(TicketResponse { ticket }))
}

/// Assign a ticket to a human agent
pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    let ticket = match state.ticket_store().set_assignee(&id, &body.assignee) {
        Ok(ticket) => ticket,
        Err(e) => return Err(ticket_error_response(e)),
    };

    state
        .audit()
        .emit(
            AuditActor::User,
            None,
            AuditEvent::TicketAssigned {
                ticket_id: ticket.id.clone(),
                assignee: body.assignee.clone(),
                assigned_by: body.assigned_by.clone(),
            },
        )
        .await;

    Ok(Json(TicketResponse { ticket }))
}

/// Queue a fresh triage attempt for a ticket
pub async fn retriage_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), impl IntoResponse> {
    let ticket = match state.ticket_store().get(&id) {
        Ok(Some(ticket)) => ticket,
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("Ticket not found: {}", id),
            ))
        }
        Err(e) => return Err(ticket_error_response(e)),
    };

    if !ticket.status.can_triage() {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!(
                "cannot re-triage ticket {} in status {}",
                ticket.id, ticket.status
            ),
        ));
    }

    let trace_id = uuid::Uuid::new_v4().to_string();
    match state.queue().enqueue(&ticket.id, &trace_id) {
        Ok(handle) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "ticket_id": handle.ticket_id,
                "trace_id": handle.trace_id,
            })),
        )),
        Err(_) => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "triage queue unavailable",
        )),
    }
}

/// List triage suggestions for a ticket, newest first
pub async fn list_suggestions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<triage_core::AgentSuggestion>>, impl IntoResponse> {
    match state.ticket_store().get(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("Ticket not found: {}", id),
            ))
        }
        Err(e) => return Err(ticket_error_response(e)),
    }

    match state.suggestion_store().list_for_ticket(&id) {
        Ok(suggestions) => Ok(Json(suggestions)),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Delete a ticket. Suggestions and audit history are left in place.
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    match state.ticket_store().delete(&id) {
        Ok(ticket) => Ok(Json(TicketResponse { ticket })),
        Err(e) => Err(ticket_error_response(e)),
    }
}
