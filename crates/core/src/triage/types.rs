//! Types for the triage queue and runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::policy::PolicyError;
use crate::suggestion::SuggestionError;
use crate::ticket::TicketError;

/// Errors that can occur during triage.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The queue cannot accept work (full or shut down).
    #[error("triage queue unavailable")]
    QueueUnavailable,

    /// Ticket referenced by a job no longer exists.
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    /// Classification service error.
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Ticket store error.
    #[error("ticket error: {0}")]
    Ticket(#[from] TicketError),

    /// Suggestion store error.
    #[error("suggestion error: {0}")]
    Suggestion(#[from] SuggestionError),

    /// Policy store error.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),
}

impl TriageError {
    /// Whether the failed attempt should be re-delivered.
    ///
    /// Classification faults and persistence errors are transient; a state
    /// machine violation or a missing ticket will not change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TriageError::Classifier(_) => true,
            TriageError::Ticket(TicketError::Database(_)) => true,
            TriageError::Suggestion(SuggestionError::Database(_)) => true,
            TriageError::Policy(PolicyError::Database(_)) => true,
            TriageError::QueueUnavailable
            | TriageError::TicketNotFound(_)
            | TriageError::Ticket(_)
            | TriageError::Suggestion(_)
            | TriageError::Policy(_) => false,
        }
    }
}

/// One unit of triage work. Ephemeral: created on ticket creation, destroyed
/// on terminal success or permanent failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageJob {
    pub ticket_id: String,
    /// Links all audit entries of this triage attempt chain.
    pub trace_id: String,
    /// Delivery attempt number (1-based).
    pub attempt: u32,
}

/// Handle returned to the caller of enqueue.
#[derive(Debug, Clone, Serialize)]
pub struct JobHandle {
    pub ticket_id: String,
    pub trace_id: String,
}

/// How a finished job ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    AutoClosed {
        suggestion_id: String,
        confidence: f32,
    },
    AssignedToHuman {
        suggestion_id: String,
        confidence: f32,
        reason: String,
    },
    Failed {
        error: String,
        attempts: u32,
    },
}

/// A finished job retained in the bounded recent history.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinishedJob {
    pub ticket_id: String,
    pub trace_id: String,
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot of the runner's state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriageStatus {
    /// Whether the runner is accepting and processing jobs.
    pub running: bool,
    /// Configured worker pool size.
    pub workers: usize,
    /// Jobs currently being processed.
    pub in_flight: usize,
    /// Jobs waiting in the queue (including backoff re-deliveries).
    pub queued: usize,
    /// Most recent successful jobs, newest first.
    pub recent_completed: Vec<FinishedJob>,
    /// Most recent permanently failed jobs, newest first.
    pub recent_failed: Vec<FinishedJob>,
}
