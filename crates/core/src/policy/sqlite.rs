//! SQLite-backed policy store.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{PolicyError, PolicyStore, PolicyUpdate, TriagePolicy};

/// SQLite-backed policy store. Single-row table; the row is created lazily
/// with defaults on first read.
pub struct SqlitePolicyStore {
    conn: Mutex<Connection>,
}

impl SqlitePolicyStore {
    /// Create a new SQLite policy store, creating the database file and
    /// tables if needed.
    pub fn new(path: &Path) -> Result<Self, PolicyError> {
        let conn = Connection::open(path).map_err(|e| PolicyError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite policy store (useful for testing).
    pub fn in_memory() -> Result<Self, PolicyError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PolicyError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PolicyError> {
        // Several stores share one database file; wait out writer contention
        // instead of surfacing SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| PolicyError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS triage_policy (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| PolicyError::Database(e.to_string()))?;

        Ok(())
    }

    fn read_locked(conn: &Connection) -> Result<Option<TriagePolicy>, PolicyError> {
        let data: Option<String> = conn
            .query_row("SELECT data FROM triage_policy WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| PolicyError::Database(e.to_string()))?;

        match data {
            Some(json) => {
                let policy = serde_json::from_str(&json)
                    .map_err(|e| PolicyError::Database(e.to_string()))?;
                Ok(Some(policy))
            }
            None => Ok(None),
        }
    }

    fn write_locked(conn: &Connection, policy: &TriagePolicy) -> Result<(), PolicyError> {
        let json =
            serde_json::to_string(policy).map_err(|e| PolicyError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO triage_policy (id, data, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PolicyError::Database(e.to_string()))?;

        Ok(())
    }
}

impl PolicyStore for SqlitePolicyStore {
    fn get(&self) -> Result<TriagePolicy, PolicyError> {
        let conn = self.conn.lock().unwrap();

        match Self::read_locked(&conn)? {
            Some(policy) => Ok(policy),
            None => {
                let policy = TriagePolicy::default();
                Self::write_locked(&conn, &policy)?;
                Ok(policy)
            }
        }
    }

    fn update(&self, update: PolicyUpdate) -> Result<TriagePolicy, PolicyError> {
        update.validate().map_err(PolicyError::Invalid)?;

        let conn = self.conn.lock().unwrap();

        let mut policy = Self::read_locked(&conn)?.unwrap_or_default();
        update.apply_to(&mut policy);
        Self::write_locked(&conn, &policy)?;

        Ok(policy)
    }
}
