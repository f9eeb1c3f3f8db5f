use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{TicketCategory, TicketStatus};

/// Who caused an audit entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    /// The triage pipeline itself.
    System,
    /// The classification agent (system-authored replies).
    Agent,
    /// A human user or operator.
    User,
}

impl AuditActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditActor::System => "system",
            AuditActor::Agent => "agent",
            AuditActor::User => "user",
        }
    }
}

/// Audit event types.
///
/// One variant per action with a typed payload; the serialized form is what
/// lands in the audit store's `data` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_summary: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Ticket lifecycle
    TicketCreated {
        ticket_id: String,
        created_by: String,
        title: String,
        category: TicketCategory,
    },
    StatusChanged {
        ticket_id: String,
        from_status: TicketStatus,
        to_status: TicketStatus,
        reason: Option<String>,
    },
    TicketAssigned {
        ticket_id: String,
        assignee: String,
        assigned_by: String,
    },
    ReplySent {
        ticket_id: String,
        /// None for system-authored replies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        is_agent: bool,
    },

    // Triage pipeline
    /// A triage attempt began for a ticket.
    TriageStarted {
        ticket_id: String,
        /// Delivery attempt number (1-based).
        attempt: u32,
    },

    /// The classification service returned a category prediction.
    CategoryClassified {
        ticket_id: String,
        predicted_category: TicketCategory,
        confidence: f32,
        provider: String,
        model: String,
    },

    /// Knowledge-base articles were retrieved to support the draft.
    ArticlesRetrieved {
        ticket_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        article_ids: Vec<String>,
    },

    /// A draft reply was generated.
    DraftGenerated {
        ticket_id: String,
        draft_chars: usize,
    },

    /// Confidence cleared the threshold and the ticket was auto-resolved.
    AutoClosed {
        ticket_id: String,
        suggestion_id: String,
        confidence: f32,
        threshold: f32,
    },

    /// Confidence did not clear the threshold (or auto-close is disabled);
    /// the ticket was handed to a human.
    AssignedToHuman {
        ticket_id: String,
        confidence: f32,
        threshold: f32,
        reason: String,
    },

    /// The triage retry budget was exhausted; the ticket was fenced to
    /// waiting_human.
    TriageFailed {
        ticket_id: String,
        error: String,
        attempts: u32,
    },

    // Operator actions
    PolicyUpdated {
        updated_by: String,
        auto_close_enabled: bool,
        confidence_threshold: f32,
        max_retries: u32,
    },
}

impl AuditEvent {
    /// Returns the action tag as a string for storage.
    pub fn action(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketCreated { .. } => "ticket_created",
            Self::StatusChanged { .. } => "status_changed",
            Self::TicketAssigned { .. } => "ticket_assigned",
            Self::ReplySent { .. } => "reply_sent",
            Self::TriageStarted { .. } => "triage_started",
            Self::CategoryClassified { .. } => "category_classified",
            Self::ArticlesRetrieved { .. } => "articles_retrieved",
            Self::DraftGenerated { .. } => "draft_generated",
            Self::AutoClosed { .. } => "auto_closed",
            Self::AssignedToHuman { .. } => "assigned_to_human",
            Self::TriageFailed { .. } => "triage_failed",
            Self::PolicyUpdated { .. } => "policy_updated",
        }
    }

    /// Extract ticket_id if this event is ticket-related.
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::StatusChanged { ticket_id, .. }
            | Self::TicketAssigned { ticket_id, .. }
            | Self::ReplySent { ticket_id, .. }
            | Self::TriageStarted { ticket_id, .. }
            | Self::CategoryClassified { ticket_id, .. }
            | Self::ArticlesRetrieved { ticket_id, .. }
            | Self::DraftGenerated { ticket_id, .. }
            | Self::AutoClosed { ticket_id, .. }
            | Self::AssignedToHuman { ticket_id, .. }
            | Self::TriageFailed { ticket_id, .. } => Some(ticket_id),
            Self::ServiceStarted { .. }
            | Self::ServiceStopped { .. }
            | Self::PolicyUpdated { .. } => None,
        }
    }
}

/// A stored audit record with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub ticket_id: Option<String>,
    /// Identifier linking all entries of one triage attempt.
    pub trace_id: Option<String>,
    pub actor: AuditActor,
    pub data: AuditEvent,
}
