//! Agent suggestions: the persisted outcome of each classification.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteSuggestionStore;
pub use store::{SuggestionError, SuggestionStore};
pub use types::{AgentSuggestion, ModelInfo, NewSuggestion};
