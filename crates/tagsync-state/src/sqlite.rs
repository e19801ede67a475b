//! `SQLite`-backed implementation of [`StateBackend`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::Connection;

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for the state table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY NOT NULL,
    str_value TEXT,
    int_value INTEGER,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteStateBackend::open`] for file-backed persistence
/// or [`SqliteStateBackend::in_memory`] for tests.
pub struct SqliteStateBackend {
    conn: Mutex<Connection>,
}

impl SqliteStateBackend {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Backend`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| StateError::backend("open", e))?;
        Self::init(conn)
    }

    /// Create an in-memory `SQLite` backend (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Backend`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StateError::backend("open", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> error::Result<Self> {
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StateError::backend("create tables", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Format current UTC time for `SQLite` storage.
    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }
}

impl StateBackend for SqliteStateBackend {
    fn get_string(&self, key: &str) -> error::Result<Option<String>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT str_value FROM sync_state WHERE key = ?1",
            [key],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(value) => Ok(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StateError::backend("get_string", e)),
        }
    }

    fn put_string(&self, key: &str, value: &str) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_state (key, str_value, int_value, updated_at) \
             VALUES (?1, ?2, NULL, ?3) \
             ON CONFLICT(key) DO UPDATE SET str_value = ?2, int_value = NULL, updated_at = ?3",
            rusqlite::params![key, value, Self::now_sqlite()],
        )
        .map_err(|e| StateError::backend("put_string", e))?;
        Ok(())
    }

    fn get_i64(&self, key: &str) -> error::Result<Option<i64>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT int_value FROM sync_state WHERE key = ?1",
            [key],
            |row| row.get::<_, Option<i64>>(0),
        );
        match result {
            Ok(value) => Ok(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StateError::backend("get_i64", e)),
        }
    }

    fn put_i64(&self, key: &str, value: i64) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_state (key, str_value, int_value, updated_at) \
             VALUES (?1, NULL, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET str_value = NULL, int_value = ?2, updated_at = ?3",
            rusqlite::params![key, value, Self::now_sqlite()],
        )
        .map_err(|e| StateError::backend("put_i64", e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM sync_state WHERE key = ?1", [key])
            .map_err(|e| StateError::backend("remove", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_roundtrip() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        assert!(backend.get_string("q_sync_marker").unwrap().is_none());

        backend.put_string("q_sync_marker", "2024-01-15").unwrap();
        assert_eq!(
            backend.get_string("q_sync_marker").unwrap().as_deref(),
            Some("2024-01-15")
        );
    }

    #[test]
    fn string_upsert() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend.put_string("k", "100").unwrap();
        backend.put_string("k", "200").unwrap();
        assert_eq!(backend.get_string("k").unwrap().as_deref(), Some("200"));
    }

    #[test]
    fn integer_roundtrip_replaces_string() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend.put_string("k", "text").unwrap();
        backend.put_i64("k", 1_700_000_000_000).unwrap();
        assert_eq!(backend.get_i64("k").unwrap(), Some(1_700_000_000_000));
        assert!(backend.get_string("k").unwrap().is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let backend = SqliteStateBackend::in_memory().unwrap();
        backend.put_string("k", "v").unwrap();
        backend.remove("k").unwrap();
        backend.remove("k").unwrap();
        assert!(backend.get_string("k").unwrap().is_none());
    }

    #[test]
    fn file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let backend = SqliteStateBackend::open(&path).unwrap();
            backend.put_string("session", "s-1").unwrap();
        }
        let reopened = SqliteStateBackend::open(&path).unwrap();
        assert_eq!(reopened.get_string("session").unwrap().as_deref(), Some("s-1"));
    }
}
