//! SQLite-backed activity log source

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use streak_source::{ActivityEntry, ActivityLogSource, CategoryStats, SourceError, SourceResult};
use streak_util::{local_from_millis, DayCutoff};
use tracing::{debug, warn};

const DAY_CUTOFF_KEY: &str = "day_cutoff";

fn query_error(e: rusqlite::Error) -> SourceError {
    SourceError::Query(e.to_string())
}

/// Activity log kept in a SQLite database.
///
/// Entries live in `activity_log` (epoch-millisecond timestamps), and the
/// scheduler's day cutoff is read from the `scheduler` key-value table.
/// When no cutoff has been recorded the fallback given at open time is used.
pub struct SqliteActivityLog {
    conn: Mutex<Connection>,
    fallback_cutoff: DayCutoff,
}

impl SqliteActivityLog {
    /// Open or create an activity log at the given path
    pub fn open(path: impl AsRef<Path>, fallback_cutoff: DayCutoff) -> SourceResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::with_connection(conn, fallback_cutoff)
    }

    /// Create an in-memory activity log (for testing)
    pub fn in_memory(fallback_cutoff: DayCutoff) -> SourceResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Self::with_connection(conn, fallback_cutoff)
    }

    fn with_connection(conn: Connection, fallback_cutoff: DayCutoff) -> SourceResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts_ms INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                category TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activity_log_ts ON activity_log(ts_ms);

            CREATE TABLE IF NOT EXISTS scheduler (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(query_error)?;

        debug!("Activity log schema initialized");
        Ok(Self {
            conn: Mutex::new(conn),
            fallback_cutoff,
        })
    }

    fn conn(&self) -> SourceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SourceError::Unavailable("Activity log lock poisoned".into()))
    }

    /// Append an entry, returning its id
    pub fn append(
        &self,
        timestamp: DateTime<Local>,
        duration: Duration,
        category: &str,
    ) -> SourceResult<i64> {
        let conn = self.conn()?;
        let duration_ms = i64::try_from(duration.as_millis())
            .map_err(|_| SourceError::Query("Duration out of range".into()))?;

        conn.execute(
            "INSERT INTO activity_log (ts_ms, duration_ms, category) VALUES (?, ?, ?)",
            params![timestamp.timestamp_millis(), duration_ms, category],
        )
        .map_err(query_error)?;

        let id = conn.last_insert_rowid();
        debug!(id, category, duration_ms, "Activity appended");
        Ok(id)
    }

    /// Record the scheduler's day cutoff
    pub fn set_day_cutoff(&self, cutoff: DayCutoff) -> SourceResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO scheduler (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![DAY_CUTOFF_KEY, cutoff.to_string()],
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn query_entries(
        &self,
        start: DateTime<Local>,
        end: Option<DateTime<Local>>,
    ) -> SourceResult<Vec<ActivityEntry>> {
        let conn = self.conn()?;
        let end_ms = end.map(|e| e.timestamp_millis()).unwrap_or(i64::MAX);

        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, ts_ms, duration_ms FROM activity_log
                WHERE ts_ms >= ? AND ts_ms < ?
                ORDER BY ts_ms, id
                "#,
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![start.timestamp_millis(), end_ms], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(query_error)?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, ts_ms, duration_ms) = row.map_err(query_error)?;
            let Some(timestamp) = local_from_millis(ts_ms) else {
                warn!(id, ts_ms, "Skipping entry with unrepresentable timestamp");
                continue;
            };
            entries.push(ActivityEntry {
                id,
                timestamp,
                duration: Duration::from_millis(duration_ms.max(0) as u64),
            });
        }
        Ok(entries)
    }
}

impl ActivityLogSource for SqliteActivityLog {
    fn day_cutoff(&self) -> SourceResult<DayCutoff> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM scheduler WHERE key = ?",
                [DAY_CUTOFF_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;

        match raw {
            Some(raw) => match DayCutoff::parse(&raw) {
                Ok(cutoff) => Ok(cutoff),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Invalid stored day cutoff, using fallback");
                    Ok(self.fallback_cutoff)
                }
            },
            None => Ok(self.fallback_cutoff),
        }
    }

    fn entries_since(&self, since: DateTime<Local>) -> SourceResult<Vec<ActivityEntry>> {
        self.query_entries(since, None)
    }

    fn entries_between(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> SourceResult<Vec<ActivityEntry>> {
        self.query_entries(start, Some(end))
    }

    fn category_breakdown(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> SourceResult<Vec<CategoryStats>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT category, COUNT(*), COALESCE(SUM(duration_ms), 0)
                FROM activity_log
                WHERE ts_ms >= ? AND ts_ms < ?
                GROUP BY category
                ORDER BY category
                "#,
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![start.timestamp_millis(), end.timestamp_millis()],
                |row| {
                    Ok(CategoryStats {
                        category: row.get(0)?,
                        count: row.get::<_, i64>(1)?.max(0) as u64,
                        total_duration: Duration::from_millis(row.get::<_, i64>(2)?.max(0) as u64),
                    })
                },
            )
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => false,
        }
    }
}
