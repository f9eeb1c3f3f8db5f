//! Core ticket data types and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a support ticket.
///
/// Closed set; anything the classifier cannot place lands in `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Billing,
    Tech,
    Shipping,
    Other,
}

impl Default for TicketCategory {
    fn default() -> Self {
        TicketCategory::Other
    }
}

impl TicketCategory {
    /// Returns the category as a string (for storage and filtering).
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Billing => "billing",
            TicketCategory::Tech => "tech",
            TicketCategory::Shipping => "shipping",
            TicketCategory::Other => "other",
        }
    }

    /// All known categories, in a stable order.
    pub fn all() -> [TicketCategory; 4] {
        [
            TicketCategory::Billing,
            TicketCategory::Tech,
            TicketCategory::Shipping,
            TicketCategory::Other,
        ]
    }
}

impl std::fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority for queue ordering and SLA tracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TicketPriority {
    fn default() -> Self {
        TicketPriority::Medium
    }
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

/// Current status of a ticket.
///
/// State machine flow:
/// ```text
/// open -> triaged -> resolved        (auto-close decision)
///                 -> waiting_human   (assign-to-human decision)
///
/// triaged | waiting_human -> resolved | closed | waiting_human   (human reply)
/// resolved -> closed                                             (human close)
/// open | triaged | waiting_human -> triaged                      (re-triage)
/// open | triaged -> waiting_human                                (triage failure fence)
///
/// closed is terminal.
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Ticket created, not yet classified.
    Open,
    /// A classification has been recorded for this ticket.
    Triaged,
    /// Waiting for a human agent to act.
    WaitingHuman,
    /// Resolved, either automatically or by a human reply.
    Resolved,
    /// Closed by a human (terminal).
    Closed,
}

impl TicketStatus {
    /// Returns the status as a string (for storage and filtering).
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Triaged => "triaged",
            TicketStatus::WaitingHuman => "waiting_human",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }

    /// Returns true if the automated pipeline may (re-)triage a ticket in
    /// this status. Resolved and closed tickets are off limits.
    pub fn can_triage(&self) -> bool {
        matches!(
            self,
            TicketStatus::Open | TicketStatus::Triaged | TicketStatus::WaitingHuman
        )
    }

    /// Returns true if the ticket is waiting for agent attention.
    pub fn needs_attention(&self) -> bool {
        matches!(self, TicketStatus::WaitingHuman)
    }

    /// Validates a status transition.
    ///
    /// Transitions not in the edge list above are rejected. Self-transitions
    /// are allowed only for `waiting_human` (a human reply that keeps the
    /// ticket waiting) and `triaged` (re-triage).
    pub fn can_transition(from: TicketStatus, to: TicketStatus) -> bool {
        use TicketStatus::*;
        match (from, to) {
            (Open, Triaged) => true,
            // Triage failure fence: budget exhausted before a classification
            // was recorded.
            (Open, WaitingHuman) => true,
            (Triaged, Resolved) | (Triaged, WaitingHuman) | (Triaged, Closed) => true,
            // Re-triage while not resolved/closed.
            (Triaged, Triaged) | (WaitingHuman, Triaged) => true,
            (WaitingHuman, Resolved) | (WaitingHuman, Closed) | (WaitingHuman, WaitingHuman) => {
                true
            }
            (Resolved, Closed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply on a ticket. Owned by the ticket, same lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    /// Author user reference. None for system-authored replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Reply body.
    pub content: String,
    /// True if this reply was produced by the triage agent.
    #[serde(default)]
    pub is_agent: bool,
    pub created_at: DateTime<Utc>,
}

impl Reply {
    /// Create a human-authored reply.
    pub fn from_user(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            content: content.into(),
            is_agent: false,
            created_at: Utc::now(),
        }
    }

    /// Create a system-authored reply (no author, agent flag set).
    pub fn from_agent(content: impl Into<String>) -> Self {
        Self {
            author: None,
            content: content.into(),
            is_agent: true,
            created_at: Utc::now(),
        }
    }
}

/// A support ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Unique identifier (UUID).
    pub id: String,

    pub title: String,
    pub description: String,

    /// Category as stated by the creator; may be corrected by triage.
    #[serde(default)]
    pub category: TicketCategory,

    pub status: TicketStatus,

    #[serde(default)]
    pub priority: TicketPriority,

    /// User who created the ticket.
    pub created_by: String,

    /// Human agent assigned to the ticket, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Most recent triage suggestion. Set only after a classification
    /// completes; on re-triage the latest suggestion wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_suggestion_id: Option<String>,

    /// Ordered replies, oldest first.
    #[serde(default)]
    pub replies: Vec<Reply>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
