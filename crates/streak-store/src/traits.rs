//! Store trait definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use streak_util::LogicalDay;

use crate::StoreResult;

/// Fixed key the streak state lives under in the key-value facility
pub const STREAK_STATE_KEY: &str = "streak_state";

/// Durable record of the active-day set
pub trait HistoryStore: Send + Sync {
    /// Load the persisted set. A store that was never written yields an empty set.
    fn load_days(&self) -> StoreResult<BTreeSet<LogicalDay>>;

    /// Replace the persisted set with `days`
    fn save_days(&self, days: &BTreeSet<LogicalDay>) -> StoreResult<()>;
}

/// Host key-value facility holding the streak state
pub trait StateStore: Send + Sync {
    /// Raw JSON value stored under `key`
    fn get_config(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store a raw JSON value under `key`
    fn set_config(&self, key: &str, value_json: &str) -> StoreResult<()>;

    /// Load the streak state, if one was ever saved
    fn load_streak_state(&self) -> StoreResult<Option<StreakState>> {
        match self.get_config(STREAK_STATE_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Save the streak state
    fn save_streak_state(&self, state: &StreakState) -> StoreResult<()> {
        let json = serde_json::to_string(state)?;
        self.set_config(STREAK_STATE_KEY, &json)
    }

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Persisted streak state: a cache derived from the active-day set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakState {
    #[serde(default)]
    pub current_streak_length: u32,

    #[serde(default)]
    pub last_active_day: Option<LogicalDay>,

    #[serde(default)]
    pub earned_freeze_dates: Vec<LogicalDay>,

    #[serde(default)]
    pub consumed_freeze_dates: Vec<LogicalDay>,

    #[serde(default)]
    pub days_since_last_freeze: u32,

    /// Freeze count written by releases that stored a bare counter instead of dates.
    /// Read for migration only; never written back.
    #[serde(default, rename = "streak_freezes_available", skip_serializing)]
    pub legacy_freezes_available: Option<u32>,
}
