//! Core events emitted by the engine

use streak_util::{LogicalDay, RunId, StreakError};

/// Events emitted by the core engine
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A recalculation run began walking the window
    RecalculationStarted {
        run_id: RunId,
        today: LogicalDay,
        window_days: usize,
    },

    /// Coarse progress through the window
    RecalculationProgress {
        run_id: RunId,
        days_done: usize,
        days_total: usize,
    },

    /// Recalculation committed a new streak state
    RecalculationFinished {
        run_id: RunId,
        streak_length: u32,
        last_active_day: Option<LogicalDay>,
        freezes_available: usize,
    },

    /// Recalculation was cancelled; the previous state is kept
    RecalculationCancelled {
        run_id: RunId,
    },

    /// Recalculation failed; the previous state is kept
    RecalculationFailed {
        run_id: RunId,
        error: StreakError,
    },

    /// Days were merged into the active-day history
    HistoryImported {
        imported: usize,
        total_days: usize,
    },

    /// Today crossed the activity threshold for the first time
    DayCompleted {
        day: LogicalDay,
        before: usize,
        after: usize,
    },

    /// Freeze tokens were granted manually
    FreezesGranted {
        granted: usize,
        available: usize,
    },

    /// A freeze token covered a day outside of recalculation
    FreezeConsumed {
        day: LogicalDay,
    },
}
