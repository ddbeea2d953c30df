//! Activity log source interface for streak
//!
//! This crate defines the narrow seam between the streak engine and the
//! external activity log it reconciles against: "what is the day cutoff"
//! and "which entries happened since X". It contains no storage code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
