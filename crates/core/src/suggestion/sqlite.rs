//! SQLite-backed suggestion store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{AgentSuggestion, NewSuggestion, SuggestionError, SuggestionStore};

/// SQLite-backed suggestion store.
pub struct SqliteSuggestionStore {
    conn: Mutex<Connection>,
}

impl SqliteSuggestionStore {
    /// Create a new SQLite suggestion store, creating the database file and
    /// tables if needed.
    pub fn new(path: &Path) -> Result<Self, SuggestionError> {
        let conn = Connection::open(path).map_err(|e| SuggestionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite suggestion store (useful for testing).
    pub fn in_memory() -> Result<Self, SuggestionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SuggestionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SuggestionError> {
        // Several stores share one database file; wait out writer contention
        // instead of surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| SuggestionError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS suggestions (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL,
                auto_closed INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_suggestions_ticket_id ON suggestions(ticket_id, created_at);
            "#,
        )
        .map_err(|e| SuggestionError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_suggestion(row: &rusqlite::Row) -> rusqlite::Result<AgentSuggestion> {
        let data_json: String = row.get(3)?;
        let mut suggestion: AgentSuggestion = serde_json::from_str(&data_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        // The flag column is authoritative; the JSON payload is written once
        // at insert time.
        let auto_closed: i64 = row.get(2)?;
        suggestion.auto_closed = auto_closed != 0;

        Ok(suggestion)
    }
}

impl SuggestionStore for SqliteSuggestionStore {
    fn insert(&self, new: NewSuggestion) -> Result<AgentSuggestion, SuggestionError> {
        let conn = self.conn.lock().unwrap();

        let now: DateTime<Utc> = Utc::now();
        let suggestion = AgentSuggestion {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: new.ticket_id,
            predicted_category: new.predicted_category,
            article_ids: new.article_ids,
            draft_reply: new.draft_reply,
            confidence: new.confidence,
            auto_closed: false,
            model_info: new.model_info,
            created_at: now,
        };

        let data_json = serde_json::to_string(&suggestion)
            .map_err(|e| SuggestionError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO suggestions (id, ticket_id, auto_closed, data, created_at) VALUES (?, ?, 0, ?, ?)",
            params![
                suggestion.id,
                suggestion.ticket_id,
                data_json,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| SuggestionError::Database(e.to_string()))?;

        Ok(suggestion)
    }

    fn get(&self, id: &str) -> Result<Option<AgentSuggestion>, SuggestionError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, ticket_id, auto_closed, data, created_at FROM suggestions WHERE id = ?",
            params![id],
            Self::row_to_suggestion,
        )
        .optional()
        .map_err(|e| SuggestionError::Database(e.to_string()))
    }

    fn list_for_ticket(&self, ticket_id: &str) -> Result<Vec<AgentSuggestion>, SuggestionError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, ticket_id, auto_closed, data, created_at FROM suggestions WHERE ticket_id = ? ORDER BY created_at DESC",
            )
            .map_err(|e| SuggestionError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![ticket_id], Self::row_to_suggestion)
            .map_err(|e| SuggestionError::Database(e.to_string()))?;

        let mut suggestions = Vec::new();
        for row in rows {
            suggestions.push(row.map_err(|e| SuggestionError::Database(e.to_string()))?);
        }

        Ok(suggestions)
    }

    fn mark_auto_closed(&self, id: &str) -> Result<AgentSuggestion, SuggestionError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE suggestions SET auto_closed = 1 WHERE id = ?",
                params![id],
            )
            .map_err(|e| SuggestionError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(SuggestionError::NotFound(id.to_string()));
        }

        conn.query_row(
            "SELECT id, ticket_id, auto_closed, data, created_at FROM suggestions WHERE id = ?",
            params![id],
            Self::row_to_suggestion,
        )
        .map_err(|e| SuggestionError::Database(e.to_string()))
    }
}
