//! Streak configuration: a versioned TOML file holding service paths and
//! the accounting rules (activity threshold, freeze cadence and cap,
//! lookback window, fallback day cutoff).

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

/// Schema version this build understands
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed TOML: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("config_version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("{} validation error(s): {}", errors.len(), join_errors(errors))]
    ValidationFailed { errors: Vec<ValidationError> },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read and validate the config file at `path`
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<StreakPolicy> {
    read_policy(path.as_ref(), false)
}

/// Like [`load_config`], but an absent file yields the default policy
pub fn load_config_or_default(path: impl AsRef<Path>) -> ConfigResult<StreakPolicy> {
    read_policy(path.as_ref(), true)
}

fn read_policy(path: &Path, allow_missing: bool) -> ConfigResult<StreakPolicy> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if allow_missing && e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Config file absent, using defaults");
            Ok(StreakPolicy::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Validate TOML text and build the policy from it
pub fn parse_config(content: &str) -> ConfigResult<StreakPolicy> {
    let raw = toml::from_str::<RawConfig>(content)?;
    match raw.config_version {
        CURRENT_CONFIG_VERSION => {}
        other => return Err(ConfigError::UnsupportedVersion(other)),
    }

    let errors = validate_config(&raw);
    if errors.is_empty() {
        Ok(StreakPolicy::from_raw(raw))
    } else {
        Err(ConfigError::ValidationFailed { errors })
    }
}
