//! Activity log source traits

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use streak_util::{DayCutoff, StreakError};
use thiserror::Error;

/// Errors from activity log sources
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl From<SourceError> for StreakError {
    fn from(e: SourceError) -> Self {
        StreakError::SourceUnavailable(e.to_string())
    }
}

/// One engagement record from the external log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Source-assigned identifier
    pub id: i64,

    /// When the activity happened
    pub timestamp: DateTime<Local>,

    /// Time spent
    pub duration: Duration,
}

/// Per-category totals for one day, for detail reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub count: u64,
    pub total_duration: Duration,
}

/// Read-only view of the external activity log
pub trait ActivityLogSource: Send + Sync {
    /// The current day cutoff as reported by the log's scheduler
    fn day_cutoff(&self) -> SourceResult<DayCutoff>;

    /// All entries at or after `since`, oldest first
    fn entries_since(&self, since: DateTime<Local>) -> SourceResult<Vec<ActivityEntry>>;

    /// Entries in `[start, end)`, oldest first
    fn entries_between(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> SourceResult<Vec<ActivityEntry>> {
        Ok(self
            .entries_since(start)?
            .into_iter()
            .filter(|e| e.timestamp < end)
            .collect())
    }

    /// Per-category count and total duration of entries in `[start, end)`, sorted by category
    fn category_breakdown(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> SourceResult<Vec<CategoryStats>>;

    /// Optional: check if the source is reachable
    fn is_healthy(&self) -> bool {
        true
    }
}
