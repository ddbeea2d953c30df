//! Streak state and active days kept in one SQLite file

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use streak_util::LogicalDay;
use tracing::{debug, warn};

use crate::{HistoryStore, StateStore, StoreError, StoreResult};

/// SQLite-based store: a key-value `config` table for streak state,
/// plus an `active_days` table usable as the history store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the state database at `path`, creating tables on first use
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// A throwaway store for tests
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("Store lock poisoned".into()))
    }

    fn create_tables(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            -- Key-value configuration (streak state lives under a fixed key)
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            );

            -- Active-day set
            CREATE TABLE IF NOT EXISTS active_days (
                day TEXT PRIMARY KEY
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl StateStore for SqliteStore {
    fn get_config(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;

        let value = conn
            .query_row(
                "SELECT value_json FROM config WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set_config(&self, key: &str, value_json: &str) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO config (key, value_json)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value_json = excluded.value_json
            "#,
            params![key, value_json],
        )?;

        debug!(key, "Config value saved");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

impl HistoryStore for SqliteStore {
    fn load_days(&self) -> StoreResult<BTreeSet<LogicalDay>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT day FROM active_days ORDER BY day")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut days = BTreeSet::new();
        for row in rows {
            let raw = row?;
            let day = LogicalDay::parse(&raw)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            days.insert(day);
        }
        Ok(days)
    }

    fn save_days(&self, days: &BTreeSet<LogicalDay>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM active_days", [])?;
        {
            let mut insert = tx.prepare("INSERT INTO active_days (day) VALUES (?)")?;
            for day in days {
                insert.execute([day.to_string()])?;
            }
        }
        tx.commit()?;

        debug!(days = days.len(), "Active days saved");
        Ok(())
    }
}
