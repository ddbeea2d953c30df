//! Persistence layer for streak
//!
//! Provides:
//! - Active-day history (JSON file, replaced atomically)
//! - Streak state in a key-value `config` table
//! - A SQLite-backed activity log source

mod activity_log;
mod history_file;
mod sqlite;
mod traits;

pub use activity_log::*;
pub use history_file::*;
pub use sqlite::*;
pub use traits::*;

use streak_util::StreakError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for StreakError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(msg) => StreakError::CorruptState(msg),
            other => StreakError::StoreError(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
