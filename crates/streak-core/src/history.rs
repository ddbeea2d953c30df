//! The persisted active-day set and its import from the activity log

use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::sync::Arc;
use streak_store::HistoryStore;
use streak_util::{day_bounds, LogicalDay, StreakResult};
use tracing::{debug, info, warn};

use crate::ActivityAggregator;

/// The set of logical days that met the activity threshold.
///
/// Only grows: import and manual insertion add days, nothing removes them.
/// Every change is written through to the backing store.
pub struct ActivityHistory {
    store: Arc<dyn HistoryStore>,
    days: BTreeSet<LogicalDay>,
}

impl ActivityHistory {
    /// Load the persisted set. An unreadable store starts from an empty set.
    pub fn load(store: Arc<dyn HistoryStore>) -> Self {
        let days = match store.load_days() {
            Ok(days) => {
                debug!(days = days.len(), "Activity history loaded");
                days
            }
            Err(e) => {
                warn!(error = %e, "Activity history unreadable, starting empty");
                BTreeSet::new()
            }
        };
        Self { store, days }
    }

    pub fn days(&self) -> &BTreeSet<LogicalDay> {
        &self.days
    }

    pub fn contains(&self, day: LogicalDay) -> bool {
        self.days.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The most recent active day
    pub fn latest(&self) -> Option<LogicalDay> {
        self.days.last().copied()
    }

    /// Write `days` to the store, then adopt it. A failed write leaves
    /// the in-memory set untouched so the next attempt sees the same gap.
    fn commit(&mut self, days: BTreeSet<LogicalDay>) -> StreakResult<()> {
        self.store.save_days(&days)?;
        self.days = days;
        Ok(())
    }

    /// Add a day. Returns whether it was new; a new day is persisted immediately.
    pub fn insert(&mut self, day: LogicalDay) -> StreakResult<bool> {
        if self.days.contains(&day) {
            return Ok(false);
        }
        let mut next = self.days.clone();
        next.insert(day);
        self.commit(next)?;
        debug!(day = %day, "Active day inserted");
        Ok(true)
    }

    /// Merge every qualifying day with activity at or after `since`.
    /// Returns the number of days that were not already present.
    pub fn import_since(
        &mut self,
        aggregator: &ActivityAggregator,
        since: DateTime<Local>,
    ) -> StreakResult<usize> {
        let found = aggregator.active_days_since(since)?;
        let mut next = self.days.clone();
        next.extend(found);
        let imported = next.len() - self.days.len();

        if imported > 0 {
            self.commit(next)?;
        }

        info!(imported, total_days = self.days.len(), since = %since, "Activity history imported");
        Ok(imported)
    }

    /// Import from `overlap_days` before the latest known day, or from the
    /// epoch when the history is empty.
    pub fn import_incremental(
        &mut self,
        aggregator: &ActivityAggregator,
        overlap_days: u32,
    ) -> StreakResult<usize> {
        let since = match self.latest() {
            Some(latest) => {
                let cutoff = aggregator.try_cutoff()?;
                let start_day = latest
                    .offset_days(-i64::from(overlap_days))
                    .unwrap_or(latest);
                day_bounds(start_day, cutoff, &Local).0
            }
            None => epoch(),
        };
        self.import_since(aggregator, since)
    }

    /// Re-scan the whole log
    pub fn import_full(&mut self, aggregator: &ActivityAggregator) -> StreakResult<usize> {
        self.import_since(aggregator, epoch())
    }
}

fn epoch() -> DateTime<Local> {
    DateTime::<Local>::from(std::time::UNIX_EPOCH)
}
