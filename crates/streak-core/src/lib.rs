//! Streak and freeze accounting engine
//!
//! This crate is the heart of streak, containing:
//! - Activity aggregation against the minimum-duration threshold
//! - The persisted active-day history and its incremental import
//! - The freeze token ledger (earning, eviction, consumption)
//! - The forward recalculation walk over the lookback window
//! - The incremental "first crossing today" detector
//! - `StreakService` tying these together, and the async `StreakHandle`

mod aggregator;
mod detector;
mod events;
mod handle;
mod history;
mod ledger;
mod recalc;
mod service;

pub use aggregator::*;
pub use detector::*;
pub use events::*;
pub use handle::*;
pub use history::*;
pub use ledger::*;
pub use recalc::*;
pub use service::*;
