//! Incremental change detection: has today just been completed?

use chrono::{DateTime, Local};
use serde::Serialize;
use streak_util::{resolve_logical_day, LogicalDay, StreakResult};
use tracing::{debug, info, warn};

use crate::{ActivityAggregator, ActivityHistory};

/// Active-day count before and after a detector run.
///
/// Both are zero when nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DayCompletion {
    pub day: Option<LogicalDay>,
    pub before: usize,
    pub after: usize,
}

impl DayCompletion {
    pub const UNCHANGED: DayCompletion = DayCompletion {
        day: None,
        before: 0,
        after: 0,
    };

    /// Whether today was newly added to the active-day set
    pub fn fired(&self) -> bool {
        self.after > self.before
    }

    pub fn as_tuple(&self) -> (usize, usize) {
        (self.before, self.after)
    }
}

/// Check whether the logical day of `now` has just crossed the threshold
/// for the first time. If so, record it in `history`.
///
/// A source that cannot be read counts as "nothing changed".
pub fn record_and_check(
    history: &mut ActivityHistory,
    aggregator: &ActivityAggregator,
    now: DateTime<Local>,
) -> StreakResult<DayCompletion> {
    let cutoff = match aggregator.try_cutoff() {
        Ok(cutoff) => cutoff,
        Err(e) => {
            warn!(error = %e, "Cannot check today's activity");
            return Ok(DayCompletion::UNCHANGED);
        }
    };
    let today = resolve_logical_day(&now, cutoff.offset_seconds());

    if history.contains(today) {
        debug!(day = %today, "Today already recorded");
        return Ok(DayCompletion::UNCHANGED);
    }

    let total = match aggregator.try_total_duration_for_day(today) {
        Ok(total) => total,
        Err(e) => {
            warn!(day = %today, error = %e, "Cannot check today's activity");
            return Ok(DayCompletion::UNCHANGED);
        }
    };

    if total < aggregator.min_duration() {
        debug!(day = %today, total_secs = total.as_secs(), "Below threshold");
        return Ok(DayCompletion::UNCHANGED);
    }

    let before = history.len();
    history.insert(today)?;
    let after = history.len();

    info!(day = %today, before, after, "Day completed");
    Ok(DayCompletion {
        day: Some(today),
        before,
        after,
    })
}
