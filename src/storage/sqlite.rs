//! # SQLite Key-Value Store
//!
//! Durable backing for the secret store: one `kv` table plus a schema
//! version row.
//!
//! ```sql
//! CREATE TABLE kv (
//!     key        TEXT PRIMARY KEY NOT NULL,
//!     value      TEXT NOT NULL,
//!     updated_at INTEGER NOT NULL
//! );
//! ```

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

use super::KeyValueStore;
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Key-value store over a SQLite connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .ok();

        match version {
            None => {
                conn.execute_batch(CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![SCHEMA_VERSION],
                )
                .map_err(|e| Error::DatabaseError(format!("Failed to set schema version: {}", e)))?;

                tracing::info!("Secret store schema created (version {})", SCHEMA_VERSION);
            }
            Some(v) if v > SCHEMA_VERSION => {
                return Err(Error::DatabaseError(format!(
                    "Database schema version {} is newer than supported {}",
                    v, SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Secret store schema version: {}", v);
            }
        }

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!("Failed to read {}: {}", key, e))),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now_timestamp_millis()],
        )
        .map_err(|e| Error::StorageWriteError(format!("Failed to write {}: {}", key, e)))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM kv WHERE key = ?", params![key])
            .map_err(|e| Error::StorageWriteError(format!("Failed to delete {}: {}", key, e)))?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("missing").unwrap(), None);

        store.put("a", "1").unwrap();
        store.put("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        assert!(store.exists("a").unwrap());

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("dh_shared:alice:bob", "c2VjcmV0").unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("dh_shared:alice:bob").unwrap().as_deref(),
            Some("c2VjcmV0")
        );
    }
}
