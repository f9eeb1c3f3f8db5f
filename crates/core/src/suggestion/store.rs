//! Suggestion storage trait.

use thiserror::Error;

use super::{AgentSuggestion, NewSuggestion};

/// Error type for suggestion operations.
#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestion not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Trait for suggestion storage backends.
pub trait SuggestionStore: Send + Sync {
    /// Persist a new suggestion.
    fn insert(&self, suggestion: NewSuggestion) -> Result<AgentSuggestion, SuggestionError>;

    /// Get a suggestion by ID.
    fn get(&self, id: &str) -> Result<Option<AgentSuggestion>, SuggestionError>;

    /// List suggestions for a ticket, newest first.
    fn list_for_ticket(&self, ticket_id: &str) -> Result<Vec<AgentSuggestion>, SuggestionError>;

    /// Flip the auto_closed flag. The only mutation a suggestion admits.
    fn mark_auto_closed(&self, id: &str) -> Result<AgentSuggestion, SuggestionError>;
}
