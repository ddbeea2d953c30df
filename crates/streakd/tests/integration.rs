//! Integration tests for streakd
//!
//! These wire the SQLite activity log, the JSON history file and the SQLite
//! state store through the streak service, end to end on disk.

use chrono::{DateTime, Local, TimeZone};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use streak_config::StreakRules;
use streak_core::{StreakHandle, StreakService};
use streak_store::{JsonHistoryFile, SqliteActivityLog, SqliteStore, StateStore, STREAK_STATE_KEY};
use streak_util::{DayCutoff, LogicalDay, StreakError};

const ENOUGH: Duration = Duration::from_secs(20 * 60);

/// Today in every scenario
fn today() -> LogicalDay {
    LogicalDay::from_ymd(2025, 8, 20).unwrap()
}

fn noon(day: LogicalDay) -> DateTime<Local> {
    Local
        .from_local_datetime(&day.date().and_hms_opt(12, 0, 0).unwrap())
        .single()
        .unwrap()
}

/// Day `n` of a run of `total` days whose last day is today
fn nth(n: u32, total: u32) -> LogicalDay {
    today().offset_days(i64::from(n) - i64::from(total)).unwrap()
}

struct Env {
    _dir: tempfile::TempDir,
    log: Arc<SqliteActivityLog>,
    history_path: std::path::PathBuf,
    state: Arc<SqliteStore>,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(
            SqliteActivityLog::open(dir.path().join("activity.db"), DayCutoff::MIDNIGHT).unwrap(),
        );
        log.set_day_cutoff(DayCutoff::new(4, 0, 0).unwrap()).unwrap();
        let state = Arc::new(SqliteStore::open(dir.path().join("streak.db")).unwrap());
        let history_path = dir.path().join("streak_history.json");
        Self {
            _dir: dir,
            log,
            history_path,
            state,
        }
    }

    fn service(&self) -> StreakService {
        StreakService::open(
            StreakRules::default(),
            self.log.clone(),
            Arc::new(JsonHistoryFile::new(&self.history_path)),
            self.state.clone(),
        )
    }

    fn study(&self, day: LogicalDay, duration: Duration) {
        self.log.append(noon(day), duration, "deck").unwrap();
    }

    fn active(&self, days: impl IntoIterator<Item = LogicalDay>) {
        for day in days {
            self.study(day, ENOUGH);
        }
    }

    fn history_on_disk(&self) -> Vec<String> {
        read_history(&self.history_path)
    }
}

fn read_history(path: &Path) -> Vec<String> {
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_five_consecutive_days_earn_a_freeze() {
    let env = Env::new();
    env.active((1..=5).map(|n| nth(n, 5)));

    let mut service = env.service();
    let state = service.recalculate(noon(today())).unwrap();

    assert_eq!(state.current_streak_length, 5);
    assert_eq!(state.earned_freeze_dates, vec![nth(5, 5)]);
    assert_eq!(state.days_since_last_freeze, 0);
    assert_eq!(state.last_active_day, Some(today()));
}

#[test]
fn test_gap_without_freeze_breaks_streak() {
    let env = Env::new();
    env.active([1, 2, 3, 4, 6, 7, 8, 9].map(|n| nth(n, 9)));

    let mut service = env.service();
    let state = service.recalculate(noon(today())).unwrap();

    assert_eq!(state.current_streak_length, 4);
    assert_eq!(state.last_active_day, Some(nth(9, 9)));
    assert!(state.consumed_freeze_dates.is_empty());
}

#[test]
fn test_gap_is_covered_by_earned_freeze() {
    let env = Env::new();
    env.active([1, 2, 3, 4, 5, 7, 8].map(|n| nth(n, 8)));

    let mut service = env.service();
    let state = service.recalculate(noon(today())).unwrap();

    assert_eq!(state.consumed_freeze_dates, vec![nth(6, 8)]);
    assert!(state.earned_freeze_dates.is_empty());
    assert_eq!(state.current_streak_length, 8);
    assert_eq!(service.get_consumed_freeze_dates(), vec![nth(6, 8)]);
}

#[test]
fn test_threshold_is_inclusive() {
    let env = Env::new();
    let short_day = nth(1, 2);
    let exact_day = nth(2, 2);
    env.study(short_day, Duration::from_millis(834_000)); // 13.9 minutes
    env.study(exact_day, Duration::from_secs(14 * 60));

    let service = env.service();
    assert!(!service.get_active_days().contains(&short_day));
    assert!(service.get_active_days().contains(&exact_day));
    assert_eq!(env.history_on_disk(), vec![exact_day.to_string()]);
}

#[test]
fn test_earliest_freeze_covers_first_gap() {
    let env = Env::new();
    // Tokens on day 5 (T1) and day 10 (T2), gaps on days 11 and 12
    env.active([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 13].map(|n| nth(n, 13)));

    let mut service = env.service();

    // As of day 11, the first gap takes the older token
    let state = service.recalculate(noon(nth(11, 13))).unwrap();
    assert_eq!(state.consumed_freeze_dates, vec![nth(11, 13)]);
    assert_eq!(state.earned_freeze_dates, vec![nth(10, 13)]);

    // As of day 12, the second gap takes the remaining one
    let state = service.recalculate(noon(nth(12, 13))).unwrap();
    assert_eq!(state.consumed_freeze_dates, vec![nth(11, 13), nth(12, 13)]);
    assert!(state.earned_freeze_dates.is_empty());
    assert_eq!(state.current_streak_length, 12);

    let state = service.recalculate(noon(today())).unwrap();
    assert_eq!(state.consumed_freeze_dates, vec![nth(11, 13), nth(12, 13)]);
    assert_eq!(state.current_streak_length, 13);
}

#[test]
fn test_import_is_idempotent_and_monotonic() {
    let env = Env::new();
    env.active([nth(1, 3), nth(2, 3)]);

    let mut service = env.service();
    let first = service.get_active_days().clone();
    assert_eq!(service.import_full().unwrap(), 0);
    assert_eq!(service.get_active_days(), &first);

    env.active([nth(3, 3)]);
    assert_eq!(service.import_incremental().unwrap(), 1);
    assert!(first.is_subset(service.get_active_days()));
}

#[test]
fn test_ledger_cap_holds_for_long_streaks() {
    let env = Env::new();
    env.active((1..=40).map(|n| nth(n, 40)));

    let mut service = env.service();
    let state = service.recalculate(noon(today())).unwrap();
    assert_eq!(state.current_streak_length, 40);
    assert_eq!(state.earned_freeze_dates, vec![nth(35, 40), nth(40, 40)]);
}

#[test]
fn test_state_survives_restart() {
    let env = Env::new();
    env.active((1..=6).map(|n| nth(n, 6)));
    {
        let mut service = env.service();
        service.recalculate(noon(today())).unwrap();
    }

    let mut service = env.service();
    assert_eq!(service.get_current_streak_length(), 6);
    assert_eq!(service.get_days_since_last_freeze(), 1);
    assert_eq!(service.get_streak_freezes_available(), 1);
    assert_eq!(service.get_last_active_day(), Some(today()));
    assert!(env.state.get_config(STREAK_STATE_KEY).unwrap().is_some());
}

#[test]
fn test_detector_fires_on_first_crossing_only() {
    let env = Env::new();
    env.active([nth(1, 2)]);
    let mut service = env.service();

    let now = noon(today());
    env.log.append(now, Duration::from_secs(10 * 60), "deck").unwrap();
    assert_eq!(service.record_and_check(now).unwrap().as_tuple(), (0, 0));

    env.log.append(now, Duration::from_secs(5 * 60), "deck").unwrap();
    assert_eq!(service.record_and_check(now).unwrap().as_tuple(), (1, 2));
    assert_eq!(service.record_and_check(now).unwrap().as_tuple(), (0, 0));
    assert_eq!(env.history_on_disk().len(), 2);

    // The detector does not touch the streak state
    assert_eq!(service.get_current_streak_length(), 0);
}

#[test]
fn test_day_details_follow_cutoff() {
    let env = Env::new();
    let day = nth(1, 2);
    let next = nth(2, 2);
    let late_night = Local
        .from_local_datetime(&next.date().and_hms_opt(3, 30, 0).unwrap())
        .single()
        .unwrap();

    env.log.append(noon(day), Duration::from_secs(60), "spanish").unwrap();
    env.log.append(late_night, Duration::from_secs(120), "kanji").unwrap();

    let service = env.service();
    let details = service.get_review_details_for_day(day);
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].category, "kanji");
    assert_eq!(details[0].total_duration, Duration::from_secs(120));
    assert_eq!(service.get_review_count_for_day(day), 2);
    assert_eq!(service.get_review_count_for_day(next), 0);
}

#[test]
fn test_corrupt_files_reset_to_defaults() {
    let env = Env::new();
    std::fs::write(&env.history_path, "[\"not-a-day\"").unwrap();
    env.state.set_config(STREAK_STATE_KEY, "42").unwrap();

    let mut service = StreakService::new(
        StreakRules::default(),
        env.log.clone(),
        Arc::new(JsonHistoryFile::new(&env.history_path)),
        env.state.clone(),
    );
    assert!(service.get_active_days().is_empty());
    assert_eq!(service.get_current_streak_length(), 0);
    assert!(service.get_earned_freeze_dates().is_empty());
}

#[tokio::test]
async fn test_handle_recalculates_off_thread() {
    let env = Env::new();
    env.active((1..=5).map(|n| nth(n, 5)));
    let handle = StreakHandle::new(env.service());

    let first = handle.recalculate_at(noon(today()));
    let second = handle.recalculate_at(noon(today()));
    let a = first.wait().await.unwrap();
    let b = second.wait().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.current_streak_length, 5);

    let guard = handle.service().lock().await;
    let task = handle.recalculate_at(noon(today()));
    task.cancel();
    drop(guard);
    assert!(matches!(task.wait().await, Err(StreakError::Cancelled)));
    assert_eq!(handle.snapshot().await, a);
}
