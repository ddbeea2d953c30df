//! The forward recalculation walk
//!
//! Streak state is a cache: it is always re-derived here from the active-day
//! set alone, oldest day first, starting from an empty ledger.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use streak_config::StreakRules;
use streak_store::StreakState;
use streak_util::{LogicalDay, StreakError, StreakResult};
use tracing::debug;

use crate::FreezeLedger;

/// Days walked between progress reports
pub const PROGRESS_INTERVAL_DAYS: usize = 365;

/// How a day in the window was accounted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    Active,
    /// Inactive, covered by a freeze token
    Frozen,
    /// Inactive and uncovered: the streak resets
    Broken,
}

/// Progress through one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkProgress {
    pub days_done: usize,
    pub days_total: usize,
}

/// Inputs of one recalculation
pub struct Recalculation<'a> {
    active_days: &'a BTreeSet<LogicalDay>,
    today: LogicalDay,
    lookback_days: u32,
    days_per_freeze: u32,
    max_freezes: usize,
}

impl<'a> Recalculation<'a> {
    pub fn new(active_days: &'a BTreeSet<LogicalDay>, today: LogicalDay, rules: &StreakRules) -> Self {
        Self {
            active_days,
            today,
            lookback_days: rules.lookback_days,
            days_per_freeze: rules.days_per_freeze.max(1),
            max_freezes: rules.max_freezes,
        }
    }

    /// The days walked, oldest first
    pub fn window(&self) -> Vec<LogicalDay> {
        LogicalDay::window_ending(self.today, self.lookback_days)
    }

    /// Walk without cancellation or progress reporting
    pub fn run(&self) -> StreakResult<StreakState> {
        self.run_with(&AtomicBool::new(false), |_| {})
    }

    /// Walk the window. Checks `cancel` before every day and returns
    /// [`StreakError::Cancelled`] without a result when it is set.
    pub fn run_with(
        &self,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(WalkProgress),
    ) -> StreakResult<StreakState> {
        let window = self.window();
        let days_total = window.len();

        let mut ledger = FreezeLedger::new(self.max_freezes);
        let mut streak_counter: u32 = 0;
        let mut last_active_day: Option<LogicalDay> = None;

        for (index, day) in window.into_iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                debug!(day = %day, "Recalculation cancelled");
                return Err(StreakError::Cancelled);
            }
            if index % PROGRESS_INTERVAL_DAYS == 0 {
                on_progress(WalkProgress {
                    days_done: index,
                    days_total,
                });
            }

            match self.classify(day, &mut ledger) {
                DayState::Active | DayState::Frozen => {
                    streak_counter += 1;
                    last_active_day = Some(day);
                    if streak_counter % self.days_per_freeze == 0 {
                        ledger.earn(day);
                    }
                }
                DayState::Broken => {
                    streak_counter = 0;
                    last_active_day = None;
                }
            }

            debug_assert!(ledger.check().is_ok(), "ledger invariant broken on {day}");
        }

        on_progress(WalkProgress {
            days_done: days_total,
            days_total,
        });

        let (earned_freeze_dates, consumed_freeze_dates) = ledger.into_parts();
        Ok(StreakState {
            current_streak_length: streak_counter,
            last_active_day,
            earned_freeze_dates,
            consumed_freeze_dates,
            days_since_last_freeze: streak_counter % self.days_per_freeze,
            legacy_freezes_available: None,
        })
    }

    fn classify(&self, day: LogicalDay, ledger: &mut FreezeLedger) -> DayState {
        if self.active_days.contains(&day) {
            DayState::Active
        } else if ledger.consume_for(day) {
            DayState::Frozen
        } else {
            DayState::Broken
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> LogicalDay {
        LogicalDay::from_ymd(2025, 6, 30).unwrap()
    }

    /// Day `n` of a run of `total` days ending today (day `total` is today)
    fn nth(n: u32, total: u32) -> LogicalDay {
        today().offset_days(i64::from(n) - i64::from(total)).unwrap()
    }

    fn set(days: impl IntoIterator<Item = LogicalDay>) -> BTreeSet<LogicalDay> {
        days.into_iter().collect()
    }

    const DAYS_PER_FREEZE_DEFAULT: u32 = 5;

    fn walk(days: &BTreeSet<LogicalDay>) -> StreakState {
        Recalculation::new(days, today(), &StreakRules::default())
            .run()
            .unwrap()
    }

    #[test]
    fn test_five_day_streak_earns_one_token() {
        let days = set((1..=5).map(|n| nth(n, 5)));
        let state = walk(&days);

        assert_eq!(state.current_streak_length, 5);
        assert_eq!(state.earned_freeze_dates, vec![nth(5, 5)]);
        assert_eq!(state.days_since_last_freeze, 0);
        assert_eq!(state.last_active_day, Some(today()));
    }

    #[test]
    fn test_gap_without_token_breaks() {
        let days = set([1, 2, 3, 4, 6, 7, 8, 9].map(|n| nth(n, 9)));
        let state = walk(&days);

        assert_eq!(state.current_streak_length, 4);
        assert_eq!(state.last_active_day, Some(nth(9, 9)));
        assert!(state.consumed_freeze_dates.is_empty());
        assert!(state.earned_freeze_dates.is_empty());
    }

    #[test]
    fn test_gap_consumes_token() {
        // Days 1-5 active, day 6 gap, days 7-8 active
        let days = set([1, 2, 3, 4, 5, 7, 8].map(|n| nth(n, 8)));
        let state = walk(&days);

        assert_eq!(state.consumed_freeze_dates, vec![nth(6, 8)]);
        assert!(state.earned_freeze_dates.is_empty());
        assert_eq!(state.current_streak_length, 8);
        assert_eq!(state.days_since_last_freeze, 3);
    }

    #[test]
    fn test_earliest_token_covers_first_gap() {
        // 10 active days earn tokens on day 5 and day 10, then two gap days
        let days = set([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 13].map(|n| nth(n, 13)));
        let state = walk(&days);

        assert_eq!(state.consumed_freeze_dates, vec![nth(11, 13), nth(12, 13)]);
        // Day 12 brings the streak to 12; the counter hits 15 only on day 15
        assert!(state.earned_freeze_dates.is_empty());
        assert_eq!(state.current_streak_length, 13);
    }

    #[test]
    fn test_first_gap_takes_older_token() {
        let days = set([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12].map(|n| nth(n, 12)));
        let state = walk(&days);

        // Day 11 consumed the day-5 token, leaving the day-10 token
        assert_eq!(state.consumed_freeze_dates, vec![nth(11, 12)]);
        assert_eq!(state.earned_freeze_dates, vec![nth(10, 12)]);
    }

    #[test]
    fn test_earn_cadence_is_capped() {
        for n in [4u32, 5, 9, 10, 14, 15, 23] {
            let days = set((1..=n).map(|i| nth(i, n)));
            let state = walk(&days);
            let expected = ((n / DAYS_PER_FREEZE_DEFAULT) as usize).min(2);
            assert_eq!(state.earned_freeze_dates.len(), expected, "n = {n}");
            assert_eq!(state.current_streak_length, n);
        }
    }

    #[test]
    fn test_inactive_today_without_token_breaks() {
        let days = set([1, 2, 3].map(|n| nth(n, 4)));
        let state = walk(&days);

        assert_eq!(state.current_streak_length, 0);
        assert_eq!(state.last_active_day, None);
        assert!(state.consumed_freeze_dates.is_empty());
    }

    #[test]
    fn test_inactive_today_consumes_token() {
        let days = set((1..=5).map(|n| nth(n, 6)));
        let state = walk(&days);

        assert_eq!(state.current_streak_length, 6);
        assert_eq!(state.last_active_day, Some(today()));
        assert!(state.earned_freeze_dates.is_empty());
        assert_eq!(state.consumed_freeze_dates, vec![today()]);
        assert_eq!(state.days_since_last_freeze, 1);
    }

    #[test]
    fn test_yesterday_missing_breaks() {
        let days = set([1, 2, 3, 5].map(|n| nth(n, 5)));
        let state = walk(&days);

        // Day 4 broke the run; today starts a new one
        assert_eq!(state.current_streak_length, 1);
        assert_eq!(state.last_active_day, Some(today()));
    }

    #[test]
    fn test_empty_history() {
        let state = walk(&BTreeSet::new());
        assert_eq!(state, StreakState::default());
    }

    #[test]
    fn test_deterministic() {
        let days = set([1, 2, 3, 4, 5, 6, 8, 9, 10, 11, 12, 20].map(|n| nth(n, 20)));
        assert_eq!(walk(&days), walk(&days));
    }

    #[test]
    fn test_window_truncates_streak() {
        let rules = StreakRules {
            lookback_days: 7,
            ..StreakRules::default()
        };
        let days = set((1..=30).map(|n| nth(n, 30)));
        let state = Recalculation::new(&days, today(), &rules).run().unwrap();
        assert_eq!(state.current_streak_length, 7);
    }

    #[test]
    fn test_cancelled_walk_returns_error() {
        let days = set((1..=5).map(|n| nth(n, 5)));
        let cancel = AtomicBool::new(true);
        let result = Recalculation::new(&days, today(), &StreakRules::default())
            .run_with(&cancel, |_| {});
        assert!(matches!(result, Err(StreakError::Cancelled)));
    }

    #[test]
    fn test_progress_reports() {
        let rules = StreakRules {
            lookback_days: 800,
            ..StreakRules::default()
        };
        let days = BTreeSet::new();
        let mut reports = Vec::new();
        Recalculation::new(&days, today(), &rules)
            .run_with(&AtomicBool::new(false), |p| reports.push(p.days_done))
            .unwrap();
        assert_eq!(reports, vec![0, 365, 730, 800]);
    }
}
