//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    CreateTicketRequest, Reply, Ticket, TicketCategory, TicketError, TicketFilter, TicketPriority,
    TicketStatus, TicketStore,
};

/// SQLite-backed ticket store.
///
/// The connection mutex is held for the whole of every mutation, so the
/// read-validate-write sequences below are atomic with respect to each other.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and
    /// tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        // Several stores share one database file; wait out writer contention
        // instead of surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| TicketError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                created_by TEXT NOT NULL,
                assignee TEXT,
                agent_suggestion_id TEXT,
                replies TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_created_by ON tickets(created_by, status);
            CREATE INDEX IF NOT EXISTS idx_tickets_assignee ON tickets(assignee, status);
            CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at);
            "#,
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        if let Some(category) = filter.category {
            conditions.push("category = ?");
            params.push(Box::new(category.as_str().to_string()));
        }

        if let Some(ref created_by) = filter.created_by {
            conditions.push("created_by = ?");
            params.push(Box::new(created_by.clone()));
        }

        if let Some(ref assignee) = filter.assignee {
            conditions.push("assignee = ?");
            params.push(Box::new(assignee.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let description: String = row.get(2)?;
        let category_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let priority_str: String = row.get(5)?;
        let created_by: String = row.get(6)?;
        let assignee: Option<String> = row.get(7)?;
        let agent_suggestion_id: Option<String> = row.get(8)?;
        let replies_json: String = row.get(9)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        // Enum columns are stored as their snake_case JSON strings.
        let category: TicketCategory =
            serde_json::from_str(&format!("\"{}\"", category_str)).unwrap_or_default();
        let status: TicketStatus = serde_json::from_str(&format!("\"{}\"", status_str))
            .unwrap_or(TicketStatus::Open);
        let priority: TicketPriority =
            serde_json::from_str(&format!("\"{}\"", priority_str)).unwrap_or_default();

        let replies: Vec<Reply> = serde_json::from_str(&replies_json).unwrap_or_default();

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Ticket {
            id,
            title,
            description,
            category,
            status,
            priority,
            created_by,
            assignee,
            agent_suggestion_id,
            replies,
            created_at,
            updated_at,
        })
    }

    /// Fetch a ticket while already holding the connection lock.
    fn get_locked(
        conn: &MutexGuard<'_, Connection>,
        id: &str,
    ) -> Result<Option<Ticket>, TicketError> {
        conn.query_row(
            "SELECT id, title, description, category, status, priority, created_by, assignee, agent_suggestion_id, replies, created_at, updated_at FROM tickets WHERE id = ?",
            params![id],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(|e| TicketError::Database(e.to_string()))
    }

    /// Validate a transition against the current status, allowing no-op
    /// writes that do not change status.
    fn check_transition(ticket: &Ticket, to: TicketStatus) -> Result<(), TicketError> {
        if !TicketStatus::can_transition(ticket.status, to) {
            return Err(TicketError::InvalidTransition {
                ticket_id: ticket.id.clone(),
                from: ticket.status,
                to,
            });
        }
        Ok(())
    }

    fn write_ticket(
        conn: &MutexGuard<'_, Connection>,
        ticket: &Ticket,
    ) -> Result<(), TicketError> {
        let replies_json = serde_json::to_string(&ticket.replies)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE tickets SET status = ?, assignee = ?, agent_suggestion_id = ?, replies = ?, updated_at = ? WHERE id = ?",
            params![
                ticket.status.as_str(),
                ticket.assignee,
                ticket.agent_suggestion_id,
                replies_json,
                ticket.updated_at.to_rfc3339(),
                ticket.id,
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let ticket = Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title,
            description: request.description,
            category: request.category,
            status: TicketStatus::Open,
            priority: request.priority,
            created_by: request.created_by,
            assignee: None,
            agent_suggestion_id: None,
            replies: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO tickets (id, title, description, category, status, priority, created_by, assignee, agent_suggestion_id, replies, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                ticket.id,
                ticket.title,
                ticket.description,
                ticket.category.as_str(),
                ticket.status.as_str(),
                ticket.priority.as_str(),
                ticket.created_by,
                ticket.assignee,
                ticket.agent_suggestion_id,
                "[]",
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(ticket)
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();
        Self::get_locked(&conn, id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, title, description, category, status, priority, created_by, assignee, agent_suggestion_id, replies, created_at, updated_at FROM tickets {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row.map_err(|e| TicketError::Database(e.to_string()))?);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TicketError::Database(e.to_string()))
    }

    fn update_status(&self, id: &str, to: TicketStatus) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let mut ticket =
            Self::get_locked(&conn, id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;
        Self::check_transition(&ticket, to)?;

        ticket.status = to;
        ticket.updated_at = Utc::now();
        Self::write_ticket(&conn, &ticket)?;

        Ok(ticket)
    }

    fn mark_triaged(&self, id: &str, suggestion_id: &str) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let mut ticket =
            Self::get_locked(&conn, id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;
        Self::check_transition(&ticket, TicketStatus::Triaged)?;

        ticket.status = TicketStatus::Triaged;
        ticket.agent_suggestion_id = Some(suggestion_id.to_string());
        ticket.updated_at = Utc::now();
        Self::write_ticket(&conn, &ticket)?;

        Ok(ticket)
    }

    fn append_reply(
        &self,
        id: &str,
        reply: Reply,
        new_status: Option<TicketStatus>,
    ) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let mut ticket =
            Self::get_locked(&conn, id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;

        if let Some(to) = new_status {
            Self::check_transition(&ticket, to)?;
            ticket.status = to;
        }

        ticket.replies.push(reply);
        ticket.updated_at = Utc::now();
        Self::write_ticket(&conn, &ticket)?;

        Ok(ticket)
    }

    fn set_assignee(&self, id: &str, assignee: &str) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let mut ticket =
            Self::get_locked(&conn, id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;

        ticket.assignee = Some(assignee.to_string());
        ticket.updated_at = Utc::now();
        Self::write_ticket(&conn, &ticket)?;

        Ok(ticket)
    }

    fn delete(&self, id: &str) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let ticket =
            Self::get_locked(&conn, id)?.ok_or_else(|| TicketError::NotFound(id.to_string()))?;

        conn.execute("DELETE FROM tickets WHERE id = ?", params![id])
            .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteTicketStore {
        SqliteTicketStore::in_memory().unwrap()
    }

    fn create_request(title: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            title: title.to_string(),
            description: "My invoice seems wrong".to_string(),
            category: TicketCategory::Billing,
            priority: TicketPriority::Medium,
            created_by: "user-1".to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = create_test_store();
        let ticket = store.create(create_request("Double charge")).unwrap();

        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.replies.is_empty());
        assert!(ticket.agent_suggestion_id.is_none());

        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert_eq!(fetched, ticket);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_by_status() {
        let store = create_test_store();
        let t1 = store.create(create_request("a")).unwrap();
        store.create(create_request("b")).unwrap();

        store.mark_triaged(&t1.id, "sugg-1").unwrap();

        let open = store
            .list(&TicketFilter::new().with_status(TicketStatus::Open))
            .unwrap();
        assert_eq!(open.len(), 1);

        let triaged = store
            .list(&TicketFilter::new().with_status(TicketStatus::Triaged))
            .unwrap();
        assert_eq!(triaged.len(), 1);
        assert_eq!(triaged[0].id, t1.id);
    }

    #[test]
    fn test_count_with_filter() {
        let store = create_test_store();
        store.create(create_request("a")).unwrap();
        store.create(create_request("b")).unwrap();

        assert_eq!(store.count(&TicketFilter::new()).unwrap(), 2);
        assert_eq!(
            store
                .count(&TicketFilter::new().with_created_by("user-1"))
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count(&TicketFilter::new().with_created_by("someone-else"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_mark_triaged_sets_suggestion() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        let updated = store.mark_triaged(&ticket.id, "sugg-42").unwrap();
        assert_eq!(updated.status, TicketStatus::Triaged);
        assert_eq!(updated.agent_suggestion_id.as_deref(), Some("sugg-42"));
    }

    #[test]
    fn test_mark_triaged_latest_suggestion_wins() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        store.mark_triaged(&ticket.id, "sugg-1").unwrap();
        let updated = store.mark_triaged(&ticket.id, "sugg-2").unwrap();
        assert_eq!(updated.agent_suggestion_id.as_deref(), Some("sugg-2"));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        // open -> resolved skips triaged
        let err = store
            .update_status(&ticket.id, TicketStatus::Resolved)
            .unwrap_err();
        assert!(matches!(err, TicketError::InvalidTransition { .. }));

        // Ticket unchanged.
        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert_eq!(fetched.status, TicketStatus::Open);
    }

    #[test]
    fn test_retriage_closed_rejected() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        store.mark_triaged(&ticket.id, "sugg-1").unwrap();
        store
            .update_status(&ticket.id, TicketStatus::Closed)
            .unwrap();

        let err = store.mark_triaged(&ticket.id, "sugg-2").unwrap_err();
        assert!(matches!(
            err,
            TicketError::InvalidTransition {
                from: TicketStatus::Closed,
                to: TicketStatus::Triaged,
                ..
            }
        ));
    }

    #[test]
    fn test_append_reply_with_transition() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();
        store.mark_triaged(&ticket.id, "sugg-1").unwrap();

        let updated = store
            .append_reply(
                &ticket.id,
                Reply::from_agent("Here is how to fix it."),
                Some(TicketStatus::Resolved),
            )
            .unwrap();

        assert_eq!(updated.status, TicketStatus::Resolved);
        assert_eq!(updated.replies.len(), 1);
        assert!(updated.replies[0].is_agent);
        assert_eq!(updated.replies[0].content, "Here is how to fix it.");
    }

    #[test]
    fn test_append_reply_without_transition() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();
        store.mark_triaged(&ticket.id, "sugg-1").unwrap();
        store
            .update_status(&ticket.id, TicketStatus::WaitingHuman)
            .unwrap();

        let updated = store
            .append_reply(&ticket.id, Reply::from_user("agent-9", "Looking into it"), None)
            .unwrap();

        assert_eq!(updated.status, TicketStatus::WaitingHuman);
        assert_eq!(updated.replies.len(), 1);
        assert!(!updated.replies[0].is_agent);
    }

    #[test]
    fn test_append_reply_invalid_transition_leaves_replies_untouched() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        let err = store
            .append_reply(
                &ticket.id,
                Reply::from_user("agent-9", "closing"),
                Some(TicketStatus::Resolved),
            )
            .unwrap_err();
        assert!(matches!(err, TicketError::InvalidTransition { .. }));

        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert!(fetched.replies.is_empty());
    }

    #[test]
    fn test_set_assignee() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        let updated = store.set_assignee(&ticket.id, "agent-9").unwrap();
        assert_eq!(updated.assignee.as_deref(), Some("agent-9"));
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let ticket = store.create(create_request("a")).unwrap();

        let deleted = store.delete(&ticket.id).unwrap();
        assert_eq!(deleted.id, ticket.id);
        assert!(store.get(&ticket.id).unwrap().is_none());

        let err = store.delete(&ticket.id).unwrap_err();
        assert!(matches!(err, TicketError::NotFound(_)));
    }

    #[test]
    fn test_pagination() {
        let store = create_test_store();
        for i in 0..5 {
            store.create(create_request(&format!("t-{}", i))).unwrap();
        }

        let page = store
            .list(&TicketFilter::new().with_limit(2).with_offset(0))
            .unwrap();
        assert_eq!(page.len(), 2);

        let page = store
            .list(&TicketFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let store = SqliteTicketStore::new(&db_path).unwrap();
        store.create(create_request("a")).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.count(&TicketFilter::new()).unwrap(), 1);
    }
}
