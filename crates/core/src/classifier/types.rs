//! Classification client types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::suggestion::ModelInfo;
use crate::ticket::TicketCategory;

/// Error type for classification operations.
///
/// Every variant is retryable from the queue's point of view; the client
/// itself never retries, so attempt counting and backoff stay centralized in
/// the triage queue.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classification timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),
}

/// Request sent to the classification service.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRequest {
    pub ticket_id: String,
    pub title: String,
    pub description: String,
    /// Category as stated by the creator; a hint, not ground truth.
    pub category: TicketCategory,
    pub trace_id: String,
}

/// Successful classification outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub predicted_category: TicketCategory,

    /// Confidence in [0, 1].
    pub confidence: f32,

    /// Supporting knowledge-base article ids (possibly empty).
    #[serde(default)]
    pub article_ids: Vec<String>,

    /// Draft reply proposed for the ticket.
    pub draft_reply: String,

    pub model_info: ModelInfo,

    /// Server-side processing time in milliseconds.
    pub processing_time_ms: u64,
}
