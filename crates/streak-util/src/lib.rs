//! Shared utilities for streak
//!
//! This crate provides:
//! - Logical day types and the day boundary resolver
//! - Time utilities (mock-aware wall clock, duration helpers)
//! - ID types (RunId)
//! - Error types shared by every layer
//! - Default paths for config and data directories

mod day;
mod error;
mod ids;
mod paths;
mod time;

pub use day::*;
pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
