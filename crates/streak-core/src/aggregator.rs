//! Activity aggregation: per-day engagement totals against the threshold

use chrono::{DateTime, Local};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use streak_config::StreakRules;
use streak_source::{ActivityEntry, ActivityLogSource, CategoryStats, SourceResult};
use streak_util::{day_bounds, resolve_logical_day, DayCutoff, LogicalDay};
use tracing::{debug, warn};

/// Classification of one logical day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Active,
    Inactive,
    /// The source could not be read; absence of activity must not be recorded
    Unknown,
}

impl DayStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, DayStatus::Active)
    }
}

/// Sum entry durations per logical day under `cutoff`
pub fn aggregate_by_day(
    entries: &[ActivityEntry],
    cutoff: DayCutoff,
) -> BTreeMap<LogicalDay, Duration> {
    let offset = cutoff.offset_seconds();
    let mut totals: BTreeMap<LogicalDay, Duration> = BTreeMap::new();
    for entry in entries {
        let day = resolve_logical_day(&entry.timestamp, offset);
        *totals.entry(day).or_default() += entry.duration;
    }
    totals
}

/// Read-side view over the activity log
pub struct ActivityAggregator {
    source: Arc<dyn ActivityLogSource>,
    min_duration: Duration,
    fallback_cutoff: DayCutoff,
}

impl ActivityAggregator {
    pub fn new(source: Arc<dyn ActivityLogSource>, rules: &StreakRules) -> Self {
        Self {
            source,
            min_duration: rules.min_duration,
            fallback_cutoff: rules.default_cutoff,
        }
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// The source's cutoff, asked fresh on every call
    pub fn try_cutoff(&self) -> SourceResult<DayCutoff> {
        self.source.day_cutoff()
    }

    /// The source's cutoff, or the configured default when it cannot be read
    pub fn current_cutoff(&self) -> DayCutoff {
        match self.source.day_cutoff() {
            Ok(cutoff) => cutoff,
            Err(e) => {
                warn!(error = %e, fallback = %self.fallback_cutoff, "Day cutoff unavailable, using default");
                self.fallback_cutoff
            }
        }
    }

    /// The logical day `now` falls on
    pub fn logical_day_of(&self, now: &DateTime<Local>) -> LogicalDay {
        resolve_logical_day(now, self.current_cutoff().offset_seconds())
    }

    /// Total engagement for `day`, propagating source failures
    pub fn try_total_duration_for_day(&self, day: LogicalDay) -> SourceResult<Duration> {
        let cutoff = self.source.day_cutoff()?;
        let (start, end) = day_bounds(day, cutoff, &Local);
        let entries = self.source.entries_between(start, end)?;
        Ok(entries.iter().map(|e| e.duration).sum())
    }

    /// Total engagement for `day`; `None` when the source is unavailable
    pub fn total_duration_for_day(&self, day: LogicalDay) -> Option<Duration> {
        match self.try_total_duration_for_day(day) {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(day = %day, error = %e, "Activity source unavailable");
                None
            }
        }
    }

    pub fn is_day_active(&self, day: LogicalDay) -> DayStatus {
        match self.total_duration_for_day(day) {
            Some(total) if total >= self.min_duration => DayStatus::Active,
            Some(_) => DayStatus::Inactive,
            None => DayStatus::Unknown,
        }
    }

    /// Every logical day at or after `since` whose total meets the threshold
    pub fn active_days_since(&self, since: DateTime<Local>) -> SourceResult<BTreeSet<LogicalDay>> {
        let cutoff = self.source.day_cutoff()?;
        let entries = self.source.entries_since(since)?;
        let totals = aggregate_by_day(&entries, cutoff);

        debug!(
            entries = entries.len(),
            days = totals.len(),
            since = %since,
            "Aggregated activity log"
        );

        Ok(totals
            .into_iter()
            .filter(|(_, total)| *total >= self.min_duration)
            .map(|(day, _)| day)
            .collect())
    }

    /// Number of entries logged during `day`; 0 when the source is unavailable
    pub fn review_count_for_day(&self, day: LogicalDay) -> u64 {
        match self.review_details_for_day(day) {
            Some(details) => details.iter().map(|c| c.count).sum(),
            None => 0,
        }
    }

    /// Per-category count and time spent during `day`, sorted by category
    pub fn review_details_for_day(&self, day: LogicalDay) -> Option<Vec<CategoryStats>> {
        let result = self.source.day_cutoff().and_then(|cutoff| {
            let (start, end) = day_bounds(day, cutoff, &Local);
            self.source.category_breakdown(start, end)
        });

        match result {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(day = %day, error = %e, "Cannot read review details");
                None
            }
        }
    }
}
