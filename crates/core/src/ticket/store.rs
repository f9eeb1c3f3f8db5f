//! Ticket storage trait and types.

use thiserror::Error;

use super::{Reply, Ticket, TicketCategory, TicketPriority, TicketStatus};

/// Error type for ticket operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Ticket not found.
    #[error("ticket not found: {0}")]
    NotFound(String),

    /// The requested status change is not a valid edge of the state machine.
    #[error("invalid transition for ticket {ticket_id}: {from} -> {to}")]
    InvalidTransition {
        ticket_id: String,
        from: TicketStatus,
        to: TicketStatus,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new ticket.
#[derive(Debug, Clone)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    /// User creating the ticket.
    pub created_by: String,
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status.
    pub status: Option<TicketStatus>,
    /// Filter by category.
    pub category: Option<TicketCategory>,
    /// Filter by creator.
    pub created_by: Option<String>,
    /// Filter by assignee.
    pub assignee: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: TicketCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for ticket storage backends.
///
/// Every mutation is a read-validate-write executed atomically with respect
/// to other mutations of the same ticket: a triage worker and a concurrent
/// human reply can never interleave between read and write. A mutation whose
/// precondition no longer holds fails with `InvalidTransition` instead of
/// clobbering the other writer.
pub trait TicketStore: Send + Sync {
    /// Create a new ticket in `open` status.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, newest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Change the ticket's status, validating the transition.
    fn update_status(&self, id: &str, to: TicketStatus) -> Result<Ticket, TicketError>;

    /// Record a completed classification: transition to `triaged` and point
    /// the ticket at its latest suggestion, in one step.
    fn mark_triaged(&self, id: &str, suggestion_id: &str) -> Result<Ticket, TicketError>;

    /// Append a reply, optionally transitioning status in the same step.
    fn append_reply(
        &self,
        id: &str,
        reply: Reply,
        new_status: Option<TicketStatus>,
    ) -> Result<Ticket, TicketError>;

    /// Assign the ticket to a human agent.
    fn set_assignee(&self, id: &str, assignee: &str) -> Result<Ticket, TicketError>;

    /// Permanently delete a ticket. Suggestions and audit entries referencing
    /// it are left in place. Returns the deleted ticket if found.
    fn delete(&self, id: &str) -> Result<Ticket, TicketError>;
}
