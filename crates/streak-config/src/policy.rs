//! Validated policy structures

use crate::schema::{RawConfig, RawRules, RawServiceConfig};
use std::path::PathBuf;
use std::time::Duration;
use streak_util::{data_dir_without_env, DayCutoff};

/// Default minimum daily activity: 14 minutes
pub const MIN_DURATION_THRESHOLD: Duration = Duration::from_secs(14 * 60);

/// Consecutive days that earn one freeze
pub const DAYS_PER_FREEZE: u32 = 5;

/// Freezes that can be held at once
pub const MAX_FREEZES: usize = 2;

/// Ten years of days
pub const DEFAULT_LOOKBACK_DAYS: u32 = 365 * 10;

pub const DEFAULT_IMPORT_OVERLAP_DAYS: u32 = 1;

const HISTORY_FILENAME: &str = "streak_history.json";
const STATE_DB_FILENAME: &str = "streak.db";
const ACTIVITY_DB_FILENAME: &str = "activity.db";

/// Validated policy ready for use by the core engine
#[derive(Debug, Clone, Default)]
pub struct StreakPolicy {
    pub service: ServiceConfig,
    pub rules: StreakRules,
}

impl StreakPolicy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            rules: StreakRules::from_raw(raw.rules),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub activity_db: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let data_dir = raw.data_dir.unwrap_or_else(data_dir_without_env);
        let activity_db = raw
            .activity_db
            .unwrap_or_else(|| data_dir.join(ACTIVITY_DB_FILENAME));
        Self {
            data_dir,
            activity_db,
        }
    }

    /// Persisted active-day set
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILENAME)
    }

    /// Key-value database holding the streak state
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join(STATE_DB_FILENAME)
    }

    /// Move the data directory. An activity log at its default location moves along.
    pub fn relocate(&mut self, data_dir: PathBuf) {
        if self.activity_db == self.data_dir.join(ACTIVITY_DB_FILENAME) {
            self.activity_db = data_dir.join(ACTIVITY_DB_FILENAME);
        }
        self.data_dir = data_dir;
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Streak and freeze accounting rules
#[derive(Debug, Clone, PartialEq)]
pub struct StreakRules {
    pub min_duration: Duration,
    pub days_per_freeze: u32,
    pub max_freezes: usize,
    pub lookback_days: u32,
    pub import_overlap_days: u32,
    pub default_cutoff: DayCutoff,
}

impl StreakRules {
    fn from_raw(raw: RawRules) -> Self {
        let defaults = Self::default();
        Self {
            min_duration: raw
                .min_duration_minutes
                .map(|m| Duration::from_millis((m * 60_000.0).round() as u64))
                .unwrap_or(defaults.min_duration),
            days_per_freeze: raw.days_per_freeze.unwrap_or(defaults.days_per_freeze),
            max_freezes: raw.max_freezes.unwrap_or(defaults.max_freezes),
            lookback_days: raw.lookback_days.unwrap_or(defaults.lookback_days),
            import_overlap_days: raw
                .import_overlap_days
                .unwrap_or(defaults.import_overlap_days),
            default_cutoff: raw
                .default_cutoff
                .and_then(|c| DayCutoff::parse(&c).ok())
                .unwrap_or(defaults.default_cutoff),
        }
    }
}

impl Default for StreakRules {
    fn default() -> Self {
        Self {
            min_duration: MIN_DURATION_THRESHOLD,
            days_per_freeze: DAYS_PER_FREEZE,
            max_freezes: MAX_FREEZES,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            import_overlap_days: DEFAULT_IMPORT_OVERLAP_DAYS,
            default_cutoff: DayCutoff::new(4, 0, 0).unwrap_or_default(),
        }
    }
}
