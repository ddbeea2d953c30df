//! The streak service: single owner of the history and the streak state

use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use streak_config::StreakRules;
use streak_source::{ActivityLogSource, CategoryStats};
use streak_store::{HistoryStore, StateStore, StreakState};
use streak_util::{LogicalDay, StreakResult};
use tracing::{debug, info, warn};

use crate::{
    detector, ActivityAggregator, ActivityHistory, DayCompletion, FreezeLedger, Recalculation,
    WalkProgress,
};

/// Owns the active-day history and the cached streak state.
///
/// Accessors never fail: they fall back to safe defaults and log.
/// Operations that change state return [`StreakResult`].
pub struct StreakService {
    rules: StreakRules,
    aggregator: ActivityAggregator,
    history: ActivityHistory,
    state_store: Arc<dyn StateStore>,
    /// Loaded on first access
    state: Option<StreakState>,
}

impl StreakService {
    /// Create a service over the given stores without touching the activity log
    pub fn new(
        rules: StreakRules,
        source: Arc<dyn ActivityLogSource>,
        history_store: Arc<dyn HistoryStore>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let aggregator = ActivityAggregator::new(source, &rules);
        let history = ActivityHistory::load(history_store);

        info!(
            active_days = history.len(),
            min_duration_secs = rules.min_duration.as_secs(),
            days_per_freeze = rules.days_per_freeze,
            max_freezes = rules.max_freezes,
            "Streak service initialized"
        );

        Self {
            rules,
            aggregator,
            history,
            state_store,
            state: None,
        }
    }

    /// Create a service and import whatever the log gained since the last run
    pub fn open(
        rules: StreakRules,
        source: Arc<dyn ActivityLogSource>,
        history_store: Arc<dyn HistoryStore>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let mut service = Self::new(rules, source, history_store, state_store);
        if let Err(e) = service.import_incremental() {
            warn!(error = %e, "Import on open failed, using local history");
        }
        service
    }

    pub fn rules(&self) -> &StreakRules {
        &self.rules
    }

    /// The logical day `now` falls on under the source's current cutoff
    pub fn today(&self, now: &DateTime<Local>) -> LogicalDay {
        self.aggregator.logical_day_of(now)
    }

    // --- Streak state ---

    fn state(&mut self) -> &StreakState {
        if self.state.is_none() {
            let today = self.today(&streak_util::now());
            self.state = Some(self.load_state(today));
        }
        self.state.get_or_insert_with(StreakState::default)
    }

    fn load_state(&self, today: LogicalDay) -> StreakState {
        match self.state_store.load_streak_state() {
            Ok(Some(raw)) => normalize_loaded_state(raw, today, &self.rules),
            Ok(None) => {
                debug!("No streak state saved yet");
                StreakState::default()
            }
            Err(e) => {
                warn!(error = %e, "Streak state unreadable, resetting to default");
                StreakState::default()
            }
        }
    }

    fn commit(&mut self, state: StreakState) -> StreakResult<()> {
        self.state_store.save_streak_state(&state)?;
        self.state = Some(state);
        Ok(())
    }

    /// A copy of the current streak state
    pub fn snapshot(&mut self) -> StreakState {
        self.state().clone()
    }

    pub fn get_current_streak_length(&mut self) -> u32 {
        self.state().current_streak_length
    }

    pub fn get_last_active_day(&mut self) -> Option<LogicalDay> {
        self.state().last_active_day
    }

    pub fn get_earned_freeze_dates(&mut self) -> Vec<LogicalDay> {
        self.state().earned_freeze_dates.clone()
    }

    pub fn get_consumed_freeze_dates(&mut self) -> Vec<LogicalDay> {
        self.state().consumed_freeze_dates.clone()
    }

    pub fn get_streak_freezes_available(&mut self) -> usize {
        self.state().earned_freeze_dates.len()
    }

    pub fn get_days_since_last_freeze(&mut self) -> u32 {
        self.state().days_since_last_freeze
    }

    // --- History ---

    pub fn get_active_days(&self) -> &BTreeSet<LogicalDay> {
        self.history.days()
    }

    /// Whether today is already in the active-day set
    pub fn has_activity_today(&self, now: &DateTime<Local>) -> bool {
        self.history.contains(self.today(now))
    }

    pub fn get_review_count_for_day(&self, day: LogicalDay) -> u64 {
        self.aggregator.review_count_for_day(day)
    }

    /// Per-category details for `day`; empty when the log is unavailable
    pub fn get_review_details_for_day(&self, day: LogicalDay) -> Vec<CategoryStats> {
        self.aggregator
            .review_details_for_day(day)
            .unwrap_or_default()
    }

    /// Import entries since shortly before the latest known day
    pub fn import_incremental(&mut self) -> StreakResult<usize> {
        let overlap = self.rules.import_overlap_days;
        self.history.import_incremental(&self.aggregator, overlap)
    }

    /// Re-scan the whole activity log
    pub fn import_full(&mut self) -> StreakResult<usize> {
        self.history.import_full(&self.aggregator)
    }

    /// Insert a day directly, ahead of the next import
    pub fn mark_active(&mut self, day: LogicalDay) -> StreakResult<bool> {
        self.history.insert(day)
    }

    /// Record today if it has just crossed the threshold.
    /// Does not recalculate the streak.
    pub fn record_and_check(&mut self, now: DateTime<Local>) -> StreakResult<DayCompletion> {
        detector::record_and_check(&mut self.history, &self.aggregator, now)
    }

    // --- Recalculation ---

    /// Re-derive the streak state from the active-day set and persist it
    pub fn recalculate(&mut self, now: DateTime<Local>) -> StreakResult<StreakState> {
        self.recalculate_with(now, &AtomicBool::new(false), |_| {})
    }

    /// Like [`Self::recalculate`], reporting progress and honoring `cancel`.
    /// A cancelled run leaves the persisted state untouched.
    pub fn recalculate_with(
        &mut self,
        now: DateTime<Local>,
        cancel: &AtomicBool,
        on_progress: impl FnMut(WalkProgress),
    ) -> StreakResult<StreakState> {
        let today = self.today(&now);
        let state = Recalculation::new(self.history.days(), today, &self.rules)
            .run_with(cancel, on_progress)?;

        self.commit(state.clone())?;

        info!(
            today = %today,
            streak = state.current_streak_length,
            freezes = state.earned_freeze_dates.len(),
            consumed = state.consumed_freeze_dates.len(),
            "Streak recalculated"
        );
        Ok(state)
    }

    // --- Manual ledger operations ---

    /// Grant up to `count` tokens dated today, bounded by the cap.
    /// The next recalculation rebuilds the ledger and drops these.
    pub fn grant_freezes(&mut self, count: usize, now: DateTime<Local>) -> StreakResult<usize> {
        let today = self.today(&now);
        let mut state = self.snapshot();
        let mut ledger = FreezeLedger::from_parts(
            std::mem::take(&mut state.earned_freeze_dates),
            std::mem::take(&mut state.consumed_freeze_dates),
            self.rules.max_freezes,
        );

        let granted = ledger.grant(count, today);
        (state.earned_freeze_dates, state.consumed_freeze_dates) = ledger.into_parts();

        if granted > 0 {
            self.commit(state)?;
        }
        info!(requested = count, granted, day = %today, "Freezes granted");
        Ok(granted)
    }

    /// Cover `day` with the earliest eligible token. Returns whether one was consumed.
    pub fn consume_freeze(&mut self, day: LogicalDay) -> StreakResult<bool> {
        let mut state = self.snapshot();
        let mut ledger = FreezeLedger::from_parts(
            std::mem::take(&mut state.earned_freeze_dates),
            std::mem::take(&mut state.consumed_freeze_dates),
            self.rules.max_freezes,
        );

        let consumed = ledger.consume_for(day);
        if !consumed {
            debug!(day = %day, "No freeze available for day");
            return Ok(false);
        }

        (state.earned_freeze_dates, state.consumed_freeze_dates) = ledger.into_parts();
        self.commit(state)?;
        info!(day = %day, "Freeze consumed");
        Ok(true)
    }
}

/// Bring a loaded record up to date: migrate the legacy counter, sort the
/// ledger lists and clamp anything out of range.
pub fn normalize_loaded_state(
    mut raw: StreakState,
    today: LogicalDay,
    rules: &StreakRules,
) -> StreakState {
    if let Some(legacy) = raw.legacy_freezes_available.take()
        && raw.earned_freeze_dates.is_empty()
    {
        let count = (legacy as usize).min(rules.max_freezes);
        raw.earned_freeze_dates = vec![today; count];
        info!(legacy, migrated = count, day = %today, "Migrated legacy freeze counter");
    }

    let ledger = FreezeLedger::from_parts(
        std::mem::take(&mut raw.earned_freeze_dates),
        std::mem::take(&mut raw.consumed_freeze_dates),
        rules.max_freezes,
    );
    (raw.earned_freeze_dates, raw.consumed_freeze_dates) = ledger.into_parts();

    let days_per_freeze = rules.days_per_freeze.max(1);
    if raw.days_since_last_freeze >= days_per_freeze {
        warn!(
            value = raw.days_since_last_freeze,
            days_per_freeze, "Days since last freeze out of range, clamping"
        );
        raw.days_since_last_freeze %= days_per_freeze;
    }

    raw
}
