//! Agent suggestion data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::TicketCategory;

/// Provenance of the model that produced a suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub provider: String,
    pub model: String,
    pub prompt_version: String,
    /// End-to-end latency of the classification call in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// The outcome of one classification of a ticket.
///
/// Immutable once created; `auto_closed` is the single exception, flipped
/// exactly once when the decision engine auto-closes the ticket. A ticket
/// accumulates one suggestion per triage attempt; the latest one wins for
/// `ticket.agent_suggestion_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSuggestion {
    /// Unique identifier (UUID).
    pub id: String,

    /// Ticket this suggestion belongs to (weak reference).
    pub ticket_id: String,

    pub predicted_category: TicketCategory,

    /// Knowledge-base articles supporting the draft reply.
    #[serde(default)]
    pub article_ids: Vec<String>,

    pub draft_reply: String,

    /// Classifier confidence in [0, 1].
    pub confidence: f32,

    /// Set when the decision engine auto-resolved the ticket with this
    /// suggestion's draft.
    #[serde(default)]
    pub auto_closed: bool,

    pub model_info: ModelInfo,

    pub created_at: DateTime<Utc>,
}

/// Request to persist a new suggestion.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub ticket_id: String,
    pub predicted_category: TicketCategory,
    pub article_ids: Vec<String>,
    pub draft_reply: String,
    pub confidence: f32,
    pub model_info: ModelInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_serialization_round_trip() {
        let suggestion = AgentSuggestion {
            id: "s-1".to_string(),
            ticket_id: "t-1".to_string(),
            predicted_category: TicketCategory::Billing,
            article_ids: vec!["a-1".to_string(), "a-2".to_string()],
            draft_reply: "Please check your invoice settings.".to_string(),
            confidence: 0.92,
            auto_closed: true,
            model_info: ModelInfo {
                provider: "gemini".to_string(),
                model: "gemini-pro".to_string(),
                prompt_version: "v1.0".to_string(),
                latency_ms: Some(412),
            },
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&suggestion).unwrap();
        assert!(json.contains("\"predicted_category\":\"billing\""));

        let parsed: AgentSuggestion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, suggestion);
    }

    #[test]
    fn test_latency_skipped_when_absent() {
        let info = ModelInfo {
            provider: "gemini".to_string(),
            model: "gemini-pro".to_string(),
            prompt_version: "v1.0".to_string(),
            latency_ms: None,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("latency_ms"));
    }
}
