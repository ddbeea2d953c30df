//! Async front door to the streak service
//!
//! Recalculation runs on the blocking pool and reports through a future
//! ([`RecalcTask::wait`]) plus a broadcast channel of [`CoreEvent`]s.
//! At most one recalculation is in flight; concurrent requests join it.

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streak_store::StreakState;
use streak_util::{LogicalDay, RunId, StreakError, StreakResult};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{CoreEvent, DayCompletion, StreakService};

const EVENT_CAPACITY: usize = 64;

type Outcome = Option<StreakResult<StreakState>>;

struct InFlight {
    run_id: RunId,
    cancel: Arc<AtomicBool>,
    result: watch::Receiver<Outcome>,
}

/// Frees the in-flight slot when a run ends, including by panic
struct ReleaseSlot<'a> {
    handle: &'a StreakHandle,
    run_id: RunId,
}

impl Drop for ReleaseSlot<'_> {
    fn drop(&mut self) {
        let mut slot = self.handle.in_flight();
        if slot.as_ref().map(|f| f.run_id) == Some(self.run_id) {
            *slot = None;
        }
    }
}

/// A running (or finished) recalculation
pub struct RecalcTask {
    run_id: RunId,
    cancel: Arc<AtomicBool>,
    result: watch::Receiver<Outcome>,
}

impl RecalcTask {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Ask the run to stop. Every waiter on this run then sees `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the run to finish
    pub async fn wait(mut self) -> StreakResult<StreakState> {
        let outcome = self
            .result
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| StreakError::internal("Recalculation task ended without a result"))?;

        match &*outcome {
            Some(result) => result.clone(),
            None => Err(StreakError::internal("Recalculation result missing")),
        }
    }
}

/// Cloneable async handle around a shared [`StreakService`]
#[derive(Clone)]
pub struct StreakHandle {
    service: Arc<Mutex<StreakService>>,
    events: broadcast::Sender<CoreEvent>,
    in_flight: Arc<std::sync::Mutex<Option<InFlight>>>,
}

impl StreakHandle {
    pub fn new(service: StreakService) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            service: Arc::new(Mutex::new(service)),
            events,
            in_flight: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Direct access to the service, for reads and tests
    pub fn service(&self) -> &Arc<Mutex<StreakService>> {
        &self.service
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a recalculation as of now, or join the one already running
    pub fn recalculate(&self) -> RecalcTask {
        self.recalculate_at(streak_util::now())
    }

    /// Start a recalculation as of `now`, or join the one already running.
    /// A joined run keeps the time it was started with.
    pub fn recalculate_at(&self, now: DateTime<Local>) -> RecalcTask {
        let mut slot = self.in_flight();

        // A closed channel means the run died without reporting
        if let Some(current) = slot.as_ref()
            && current.result.borrow().is_none()
            && current.result.has_changed().is_ok()
        {
            debug!(run_id = %current.run_id, "Joining in-flight recalculation");
            return RecalcTask {
                run_id: current.run_id,
                cancel: current.cancel.clone(),
                result: current.result.clone(),
            };
        }

        let run_id = RunId::new();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(None);

        *slot = Some(InFlight {
            run_id,
            cancel: cancel.clone(),
            result: rx.clone(),
        });
        drop(slot);

        let handle = self.clone();
        let run_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let _release = ReleaseSlot {
                handle: &handle,
                run_id,
            };
            let result = handle.run_recalculation(run_id, now, &run_cancel);
            let _ = tx.send(Some(result));
        });

        RecalcTask {
            run_id,
            cancel,
            result: rx,
        }
    }

    /// Cancel the in-flight recalculation, if any
    pub fn cancel_recalculation(&self) -> bool {
        match self.in_flight().as_ref() {
            Some(current) => {
                current.cancel.store(true, Ordering::Relaxed);
                info!(run_id = %current.run_id, "Recalculation cancel requested");
                true
            }
            None => false,
        }
    }

    fn run_recalculation(
        &self,
        run_id: RunId,
        now: DateTime<Local>,
        cancel: &AtomicBool,
    ) -> StreakResult<StreakState> {
        let mut service = self.service.blocking_lock();

        match service.import_incremental() {
            Ok(imported) => self.emit(CoreEvent::HistoryImported {
                imported,
                total_days: service.get_active_days().len(),
            }),
            Err(e) => warn!(error = %e, "Import failed, recalculating from local history"),
        }

        let today = service.today(&now);
        self.emit(CoreEvent::RecalculationStarted {
            run_id,
            today,
            window_days: service.rules().lookback_days as usize,
        });

        let result = service.recalculate_with(now, cancel, |progress| {
            self.emit(CoreEvent::RecalculationProgress {
                run_id,
                days_done: progress.days_done,
                days_total: progress.days_total,
            });
        });

        match &result {
            Ok(state) => self.emit(CoreEvent::RecalculationFinished {
                run_id,
                streak_length: state.current_streak_length,
                last_active_day: state.last_active_day,
                freezes_available: state.earned_freeze_dates.len(),
            }),
            Err(StreakError::Cancelled) => {
                info!(run_id = %run_id, "Recalculation cancelled, keeping previous state");
                self.emit(CoreEvent::RecalculationCancelled { run_id });
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Recalculation failed");
                self.emit(CoreEvent::RecalculationFailed {
                    run_id,
                    error: e.clone(),
                });
            }
        }

        result
    }

    /// A copy of the current streak state
    pub async fn snapshot(&self) -> StreakState {
        self.service.lock().await.snapshot()
    }

    pub async fn import(&self) -> StreakResult<usize> {
        let mut service = self.service.lock().await;
        let imported = service.import_incremental()?;
        self.emit(CoreEvent::HistoryImported {
            imported,
            total_days: service.get_active_days().len(),
        });
        Ok(imported)
    }

    pub async fn record_and_check(&self, now: DateTime<Local>) -> StreakResult<DayCompletion> {
        let completion = self.service.lock().await.record_and_check(now)?;
        if let Some(day) = completion.day {
            self.emit(CoreEvent::DayCompleted {
                day,
                before: completion.before,
                after: completion.after,
            });
        }
        Ok(completion)
    }

    pub async fn grant_freezes(&self, count: usize, now: DateTime<Local>) -> StreakResult<usize> {
        let mut service = self.service.lock().await;
        let granted = service.grant_freezes(count, now)?;
        if granted > 0 {
            self.emit(CoreEvent::FreezesGranted {
                granted,
                available: service.get_streak_freezes_available(),
            });
        }
        Ok(granted)
    }

    pub async fn consume_freeze(&self, day: LogicalDay) -> StreakResult<bool> {
        let consumed = self.service.lock().await.consume_freeze(day)?;
        if consumed {
            self.emit(CoreEvent::FreezeConsumed { day });
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use streak_config::StreakRules;
    use streak_source::{ActivityEntry, ActivityLogSource, CategoryStats, MockSource, SourceResult};
    use streak_store::SqliteStore;
    use streak_util::DayCutoff;

    /// Panics on the next cutoff lookup once armed
    #[derive(Default)]
    struct CrashingSource {
        inner: MockSource,
        armed: AtomicBool,
    }

    impl ActivityLogSource for CrashingSource {
        fn day_cutoff(&self) -> SourceResult<DayCutoff> {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("activity log crashed");
            }
            self.inner.day_cutoff()
        }

        fn entries_since(&self, since: DateTime<Local>) -> SourceResult<Vec<ActivityEntry>> {
            self.inner.entries_since(since)
        }

        fn category_breakdown(
            &self,
            start: DateTime<Local>,
            end: DateTime<Local>,
        ) -> SourceResult<Vec<CategoryStats>> {
            self.inner.category_breakdown(start, end)
        }
    }

    const ENOUGH: Duration = Duration::from_secs(30 * 60);

    fn handle_with_days(days_back: &[i64]) -> (StreakHandle, Arc<MockSource>) {
        let source = Arc::new(MockSource::new());
        let now = streak_util::now();
        for back in days_back {
            source.record(now - chrono::Duration::days(*back), ENOUGH, "deck");
        }
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let service = StreakService::new(StreakRules::default(), source.clone(), store.clone(), store);
        (StreakHandle::new(service), source)
    }

    #[tokio::test]
    async fn test_recalculate_imports_and_reports() {
        let (handle, _source) = handle_with_days(&[0, 1, 2, 3, 4]);
        let mut events = handle.subscribe();

        let state = handle.recalculate().wait().await.unwrap();
        assert_eq!(state.current_streak_length, 5);
        assert_eq!(handle.snapshot().await, state);

        let mut saw_import = false;
        let mut saw_progress = false;
        let mut saw_finished = false;
        while let Ok(event) = events.try_recv() {
            match event {
                CoreEvent::HistoryImported { imported, .. } => saw_import = imported == 5,
                CoreEvent::RecalculationProgress { .. } => saw_progress = true,
                CoreEvent::RecalculationFinished { streak_length, .. } => {
                    saw_finished = streak_length == 5
                }
                _ => {}
            }
        }
        assert!(saw_import && saw_progress && saw_finished);
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let (handle, _source) = handle_with_days(&[0, 1]);

        // Hold the service so the first run cannot finish before the second request
        let guard = handle.service().lock().await;
        let first = handle.recalculate();
        let second = handle.recalculate();
        let first_id = first.run_id();
        assert_eq!(first_id, second.run_id());
        drop(guard);

        let a = first.wait().await.unwrap();
        let b = second.wait().await.unwrap();
        assert_eq!(a, b);

        // A request after completion starts a fresh run
        let third = handle.recalculate();
        assert_ne!(third.run_id(), first_id);
        third.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_keeps_previous_state() {
        let (handle, source) = handle_with_days(&[0, 1, 2]);
        let before = handle.recalculate().wait().await.unwrap();
        assert_eq!(before.current_streak_length, 3);

        source.record(streak_util::now() - chrono::Duration::days(3), ENOUGH, "deck");

        let mut events = handle.subscribe();
        let guard = handle.service().lock().await;
        let task = handle.recalculate();
        assert!(handle.cancel_recalculation());
        drop(guard);

        let result = task.wait().await;
        assert!(matches!(result, Err(StreakError::Cancelled)));
        assert_eq!(handle.snapshot().await, before);

        let mut saw_cancelled = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, CoreEvent::RecalculationCancelled { .. }) {
                saw_cancelled = true;
            }
        }
        assert!(saw_cancelled);
    }

    #[tokio::test]
    async fn test_record_and_check_emits_day_completed() {
        let (handle, _source) = handle_with_days(&[0]);
        let mut events = handle.subscribe();

        let completion = handle.record_and_check(streak_util::now()).await.unwrap();
        assert!(completion.fired());
        assert_eq!(completion.as_tuple(), (0, 1));
        assert!(matches!(
            events.try_recv(),
            Ok(CoreEvent::DayCompleted { before: 0, after: 1, .. })
        ));

        let again = handle.record_and_check(streak_util::now()).await.unwrap();
        assert!(!again.fired());
    }

    #[tokio::test]
    async fn test_grant_and_consume_emit_events() {
        let (handle, _source) = handle_with_days(&[]);
        let mut events = handle.subscribe();
        let now = streak_util::now();

        assert_eq!(handle.grant_freezes(1, now).await.unwrap(), 1);
        assert!(matches!(
            events.try_recv(),
            Ok(CoreEvent::FreezesGranted { granted: 1, available: 1 })
        ));

        let tomorrow = handle
            .service()
            .lock()
            .await
            .today(&now)
            .offset_days(1)
            .unwrap();
        assert!(handle.consume_freeze(tomorrow).await.unwrap());
        assert!(matches!(events.try_recv(), Ok(CoreEvent::FreezeConsumed { .. })));
    }

    #[tokio::test]
    async fn test_crashed_run_does_not_block_later_runs() {
        let source = Arc::new(CrashingSource::default());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let service = StreakService::new(StreakRules::default(), source.clone(), store.clone(), store);
        let handle = StreakHandle::new(service);

        source.armed.store(true, Ordering::SeqCst);
        let crashed = handle.recalculate();
        let crashed_id = crashed.run_id();
        assert!(matches!(crashed.wait().await, Err(StreakError::Internal(_))));

        let retry = handle.recalculate();
        assert_ne!(retry.run_id(), crashed_id);
        let state = retry.wait().await.unwrap();
        assert_eq!(state, StreakState::default());
    }
}
