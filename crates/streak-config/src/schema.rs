//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Where state lives and where activity is read from
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Streak and freeze accounting rules
    #[serde(default)]
    pub rules: RawRules,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the active-day history and streak state
    pub data_dir: Option<PathBuf>,

    /// SQLite activity log to reconcile against
    pub activity_db: Option<PathBuf>,
}

/// Accounting rules. Every field falls back to the built-in default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRules {
    /// Minimum aggregated activity for a day to count, in minutes
    pub min_duration_minutes: Option<f64>,

    /// Consecutive days needed to earn one freeze
    pub days_per_freeze: Option<u32>,

    /// Maximum freezes held at once
    pub max_freezes: Option<usize>,

    /// Days walked by a full recalculation, ending today
    pub lookback_days: Option<u32>,

    /// Days before the latest known active day that an incremental import re-reads
    pub import_overlap_days: Option<u32>,

    /// Day cutoff (HH:MM or HH:MM:SS) used when the activity source cannot report one
    pub default_cutoff: Option<String>,
}
