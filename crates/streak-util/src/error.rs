//! Error types for streak

use thiserror::Error;

/// Broad failure classes callers use to choose between retry, default and fail-fast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// External log or persistence backend not reachable; retry later, use a safe default now
    SourceUnavailable,
    /// Persisted state failed to parse; reset to default and rebuild
    CorruptState,
    /// A ledger or history invariant was broken; a programming error
    InvariantViolation,
    /// The operation was cancelled and nothing was committed
    Cancelled,
    /// Invalid configuration or input
    Configuration,
}

/// Core error type for streak operations
#[derive(Debug, Clone, Error)]
pub enum StreakError {
    #[error("Activity source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Recalculation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreakError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            // A persistence backend that cannot be reached is handled like a missing source
            Self::SourceUnavailable(_) | Self::StoreError(_) | Self::Internal(_) => {
                ErrorClass::SourceUnavailable
            }
            Self::CorruptState(_) => ErrorClass::CorruptState,
            Self::InvariantViolation(_) => ErrorClass::InvariantViolation,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::ConfigError(_) => ErrorClass::Configuration,
        }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::SourceUnavailable
    }
}

pub type Result<T> = std::result::Result<T, StreakError>;

/// Alias used by crates that also import their own `Result`
pub type StreakResult<T> = Result<T>;
