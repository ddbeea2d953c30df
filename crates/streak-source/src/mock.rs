//! Mock activity source for testing

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streak_util::DayCutoff;

use crate::{ActivityEntry, ActivityLogSource, CategoryStats, SourceError, SourceResult};

/// A recorded entry together with the category it was logged under
#[derive(Debug, Clone)]
pub struct MockRecord {
    pub entry: ActivityEntry,
    pub category: String,
}

/// In-memory activity log for unit/integration testing
pub struct MockSource {
    cutoff: Mutex<DayCutoff>,
    next_id: AtomicI64,
    records: Arc<Mutex<Vec<MockRecord>>>,

    /// Configure every query to fail as if the log were closed
    pub unavailable: Arc<Mutex<bool>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            cutoff: Mutex::new(DayCutoff::MIDNIGHT),
            next_id: AtomicI64::new(1),
            records: Arc::new(Mutex::new(Vec::new())),
            unavailable: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_cutoff(self, cutoff: DayCutoff) -> Self {
        *self.cutoff.lock().unwrap() = cutoff;
        self
    }

    /// Simulate the log becoming unreachable (or reachable again)
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Append an entry, returning its id
    pub fn record(&self, timestamp: DateTime<Local>, duration: Duration, category: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().push(MockRecord {
            entry: ActivityEntry {
                id,
                timestamp,
                duration,
            },
            category: category.to_string(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> SourceResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(SourceError::Unavailable("Mock source offline".into()));
        }
        Ok(())
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLogSource for MockSource {
    fn day_cutoff(&self) -> SourceResult<DayCutoff> {
        self.check_available()?;
        Ok(*self.cutoff.lock().unwrap())
    }

    fn entries_since(&self, since: DateTime<Local>) -> SourceResult<Vec<ActivityEntry>> {
        self.check_available()?;
        let mut entries: Vec<ActivityEntry> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.entry.timestamp >= since)
            .map(|r| r.entry.clone())
            .collect();
        entries.sort_by_key(|e| (e.timestamp, e.id));
        Ok(entries)
    }

    fn category_breakdown(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> SourceResult<Vec<CategoryStats>> {
        self.check_available()?;
        let mut grouped: BTreeMap<String, CategoryStats> = BTreeMap::new();
        for record in self.records.lock().unwrap().iter() {
            if record.entry.timestamp < start || record.entry.timestamp >= end {
                continue;
            }
            let stats = grouped
                .entry(record.category.clone())
                .or_insert_with(|| CategoryStats {
                    category: record.category.clone(),
                    count: 0,
                    total_duration: Duration::ZERO,
                });
            stats.count += 1;
            stats.total_duration += record.entry.duration;
        }
        Ok(grouped.into_values().collect())
    }

    fn is_healthy(&self) -> bool {
        !*self.unavailable.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn mock_entries_since_filters_and_sorts() {
        let source = MockSource::new();
        source.record(at(3, 10), Duration::from_secs(60), "Spanish");
        source.record(at(1, 10), Duration::from_secs(60), "Spanish");
        source.record(at(2, 10), Duration::from_secs(60), "Kanji");

        let entries = source.entries_since(at(2, 0)).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp < entries[1].timestamp);

        let between = source.entries_between(at(2, 0), at(3, 0)).unwrap();
        assert_eq!(between.len(), 1);
    }

    #[test]
    fn mock_category_breakdown() {
        let source = MockSource::new();
        source.record(at(2, 9), Duration::from_secs(60), "Spanish");
        source.record(at(2, 10), Duration::from_secs(90), "Spanish");
        source.record(at(2, 11), Duration::from_secs(30), "Kanji");
        source.record(at(3, 11), Duration::from_secs(30), "Kanji");

        let stats = source.category_breakdown(at(2, 0), at(3, 0)).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].category, "Kanji");
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[1].category, "Spanish");
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[1].total_duration, Duration::from_secs(150));
    }

    #[test]
    fn mock_unavailable() {
        let source = MockSource::new();
        source.set_unavailable(true);
        assert!(!source.is_healthy());
        assert!(source.day_cutoff().is_err());
        assert!(source.entries_since(at(1, 0)).is_err());

        source.set_unavailable(false);
        assert!(source.day_cutoff().is_ok());
    }
}
