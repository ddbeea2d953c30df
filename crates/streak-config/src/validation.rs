//! Configuration validation

use crate::schema::{RawConfig, RawRules};
use streak_util::DayCutoff;
use thiserror::Error;

/// Longest accepted recalculation window (100 years)
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Rule '{field}': {message}")]
    RuleError { field: &'static str, message: String },

    #[error("Invalid cutoff '{value}': {message}")]
    InvalidCutoff { value: String, message: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    validate_rules(&config.rules)
}

fn validate_rules(rules: &RawRules) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(minutes) = rules.min_duration_minutes
        && !(0.0..=1440.0).contains(&minutes)
    {
        errors.push(ValidationError::RuleError {
            field: "min_duration_minutes",
            message: format!("must be between 0 and 1440, got {}", minutes),
        });
    }

    if rules.days_per_freeze == Some(0) {
        errors.push(ValidationError::RuleError {
            field: "days_per_freeze",
            message: "must be at least 1".into(),
        });
    }

    if let Some(days) = rules.lookback_days
        && (days == 0 || days > MAX_LOOKBACK_DAYS)
    {
        errors.push(ValidationError::RuleError {
            field: "lookback_days",
            message: format!("must be between 1 and {}, got {}", MAX_LOOKBACK_DAYS, days),
        });
    }

    if let Some(overlap) = rules.import_overlap_days
        && overlap > MAX_LOOKBACK_DAYS
    {
        errors.push(ValidationError::RuleError {
            field: "import_overlap_days",
            message: format!("must be at most {}, got {}", MAX_LOOKBACK_DAYS, overlap),
        });
    }

    if let Some(cutoff) = &rules.default_cutoff
        && let Err(e) = DayCutoff::parse(cutoff)
    {
        errors.push(ValidationError::InvalidCutoff {
            value: cutoff.clone(),
            message: e,
        });
    }

    errors
}
