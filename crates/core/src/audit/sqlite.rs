use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{AuditActor, AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

/// SQLite-backed audit store.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Create a new SQLite audit store, creating the database file and tables
    /// if needed.
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite audit store (useful for testing).
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), AuditError> {
        // Several stores share one database file; wait out writer contention
        // instead of surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| AuditError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                action TEXT NOT NULL,
                ticket_id TEXT,
                trace_id TEXT,
                actor TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_entries_ticket_id ON audit_entries(ticket_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_entries_trace_id ON audit_entries(trace_id);
            CREATE INDEX IF NOT EXISTS idx_audit_entries_action ON audit_entries(action);
            CREATE INDEX IF NOT EXISTS idx_audit_entries_timestamp ON audit_entries(timestamp);
            "#,
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref ticket_id) = filter.ticket_id {
            conditions.push("ticket_id = ?");
            params.push(Box::new(ticket_id.clone()));
        }

        if let Some(ref trace_id) = filter.trace_id {
            conditions.push("trace_id = ?");
            params.push(Box::new(trace_id.clone()));
        }

        if let Some(ref action) = filter.action {
            conditions.push("action = ?");
            params.push(Box::new(action.clone()));
        }

        if let Some(actor) = filter.actor {
            conditions.push("actor = ?");
            params.push(Box::new(actor.as_str().to_string()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let conn = self.conn.lock().unwrap();

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO audit_entries (timestamp, action, ticket_id, trace_id, actor, data) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.action,
                record.ticket_id,
                record.trace_id,
                record.actor.as_str(),
                data_json,
            ],
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        // Ascending: entries for one trace read back as a causal narrative.
        // The id tie-break keeps same-millisecond entries in insert order.
        let sql = format!(
            "SELECT id, timestamp, action, ticket_id, trace_id, actor, data FROM audit_entries {} ORDER BY timestamp ASC, id ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let id: i64 = row.get(0)?;
                let timestamp_str: String = row.get(1)?;
                let action: String = row.get(2)?;
                let ticket_id: Option<String> = row.get(3)?;
                let trace_id: Option<String> = row.get(4)?;
                let actor_str: String = row.get(5)?;
                let data_json: String = row.get(6)?;

                Ok((id, timestamp_str, action, ticket_id, trace_id, actor_str, data_json))
            })
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (id, timestamp_str, action, ticket_id, trace_id, actor_str, data_json) =
                row_result.map_err(|e| AuditError::Database(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| AuditError::Database(format!("invalid timestamp: {}", e)))?
                .into();

            let actor: AuditActor = serde_json::from_str(&format!("\"{}\"", actor_str))
                .map_err(|e| AuditError::Serialization(e.to_string()))?;

            let data: AuditEvent = serde_json::from_str(&data_json)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;

            records.push(AuditRecord {
                id,
                timestamp,
                action,
                ticket_id,
                trace_id,
                actor,
                data,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_entries {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| AuditError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketCategory;
    use chrono::Duration;

    fn create_test_store() -> SqliteAuditStore {
        SqliteAuditStore::in_memory().unwrap()
    }

    fn triage_started_record(ticket_id: &str, trace_id: &str, attempt: u32) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            action: "triage_started".to_string(),
            ticket_id: Some(ticket_id.to_string()),
            trace_id: Some(trace_id.to_string()),
            actor: AuditActor::System,
            data: AuditEvent::TriageStarted {
                ticket_id: ticket_id.to_string(),
                attempt,
            },
        }
    }

    fn ticket_created_record(ticket_id: &str, trace_id: &str) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            action: "ticket_created".to_string(),
            ticket_id: Some(ticket_id.to_string()),
            trace_id: Some(trace_id.to_string()),
            actor: AuditActor::User,
            data: AuditEvent::TicketCreated {
                ticket_id: ticket_id.to_string(),
                created_by: "user-1".to_string(),
                title: "Broken widget".to_string(),
                category: TicketCategory::Tech,
            },
        }
    }

    #[test]
    fn test_insert_and_query() {
        let store = create_test_store();
        let record = triage_started_record("t-1", "trace-1", 1);

        let id = store.insert(&record).unwrap();
        assert!(id > 0);

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].action, "triage_started");
        assert_eq!(results[0].actor, AuditActor::System);
    }

    #[test]
    fn test_query_by_trace_id() {
        let store = create_test_store();

        store.insert(&ticket_created_record("t-1", "trace-1")).unwrap();
        store.insert(&triage_started_record("t-1", "trace-1", 1)).unwrap();
        store.insert(&triage_started_record("t-2", "trace-2", 1)).unwrap();

        let filter = AuditFilter::new().with_trace_id("trace-1");
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.trace_id.as_deref() == Some("trace-1")));
    }

    #[test]
    fn test_query_by_ticket_id() {
        let store = create_test_store();

        store.insert(&triage_started_record("t-1", "trace-1", 1)).unwrap();
        store.insert(&triage_started_record("t-2", "trace-2", 1)).unwrap();

        let filter = AuditFilter::new().with_ticket_id("t-1");
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ticket_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn test_query_by_action_and_actor() {
        let store = create_test_store();

        store.insert(&ticket_created_record("t-1", "trace-1")).unwrap();
        store.insert(&triage_started_record("t-1", "trace-1", 1)).unwrap();

        let results = store
            .query(&AuditFilter::new().with_action("ticket_created"))
            .unwrap();
        assert_eq!(results.len(), 1);

        let results = store
            .query(&AuditFilter::new().with_actor(AuditActor::System))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].action, "triage_started");
    }

    #[test]
    fn test_query_returns_ascending_timestamp_order() {
        let store = create_test_store();

        let now = Utc::now();
        let mut older = triage_started_record("t-1", "trace-1", 1);
        older.timestamp = now - Duration::seconds(10);
        let mut newer = triage_started_record("t-1", "trace-1", 2);
        newer.timestamp = now;

        // Insert newest first; query must still come back oldest first.
        store.insert(&newer).unwrap();
        store.insert(&older).unwrap();

        let results = store.query(&AuditFilter::new().with_trace_id("trace-1")).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].timestamp < results[1].timestamp);
    }

    #[test]
    fn test_query_with_time_range() {
        let store = create_test_store();

        let now = Utc::now();
        let mut old_record = triage_started_record("t-1", "trace-1", 1);
        old_record.timestamp = now - Duration::hours(2);
        store.insert(&old_record).unwrap();

        let mut new_record = triage_started_record("t-1", "trace-2", 1);
        new_record.timestamp = now;
        store.insert(&new_record).unwrap();

        let filter = AuditFilter::new().with_time_range(Some(now - Duration::hours(1)), None);
        let results = store.query(&filter).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_pagination() {
        let store = create_test_store();

        for i in 0..5 {
            store
                .insert(&triage_started_record(&format!("t-{}", i), "trace-1", 1))
                .unwrap();
        }

        let filter = AuditFilter::new().with_limit(2).with_offset(0);
        assert_eq!(store.query(&filter).unwrap().len(), 2);

        let filter = AuditFilter::new().with_limit(2).with_offset(4);
        assert_eq!(store.query(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_count() {
        let store = create_test_store();

        store.insert(&ticket_created_record("t-1", "trace-1")).unwrap();
        store.insert(&triage_started_record("t-1", "trace-1", 1)).unwrap();
        store.insert(&triage_started_record("t-2", "trace-2", 1)).unwrap();

        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 3);
        assert_eq!(
            store
                .count(&AuditFilter::new().with_action("triage_started"))
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let store = SqliteAuditStore::new(&db_path).unwrap();
        store.insert(&triage_started_record("t-1", "trace-1", 1)).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.query(&AuditFilter::new()).unwrap().len(), 1);
    }
}
