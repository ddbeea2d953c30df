//! Freeze token ledger

use streak_util::LogicalDay;
use tracing::warn;

/// Earned and consumed freeze tokens.
///
/// Invariants:
/// - `earned` is sorted and holds at most `max_freezes` dates
/// - `consumed` is sorted and holds each date at most once
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FreezeLedger {
    earned: Vec<LogicalDay>,
    consumed: Vec<LogicalDay>,
    max_freezes: usize,
}

impl FreezeLedger {
    pub fn new(max_freezes: usize) -> Self {
        Self {
            earned: Vec::new(),
            consumed: Vec::new(),
            max_freezes,
        }
    }

    /// Rebuild a ledger from persisted lists, healing any broken invariant
    pub fn from_parts(
        earned: Vec<LogicalDay>,
        consumed: Vec<LogicalDay>,
        max_freezes: usize,
    ) -> Self {
        let mut ledger = Self {
            earned,
            consumed,
            max_freezes,
        };
        ledger.heal();
        ledger
    }

    pub fn earned(&self) -> &[LogicalDay] {
        &self.earned
    }

    pub fn consumed(&self) -> &[LogicalDay] {
        &self.consumed
    }

    /// Tokens currently available
    pub fn available(&self) -> usize {
        self.earned.len()
    }

    /// Whether `day` was already covered by a token
    pub fn is_covered(&self, day: LogicalDay) -> bool {
        self.consumed.binary_search(&day).is_ok()
    }

    /// Earn a token dated `day`, evicting the oldest surplus beyond the cap
    pub fn earn(&mut self, day: LogicalDay) {
        let pos = self.earned.partition_point(|d| *d <= day);
        self.earned.insert(pos, day);
        self.evict_surplus();
    }

    /// Cover the gap `day` with the earliest token earned on or before it.
    /// Returns whether a token was consumed.
    pub fn consume_for(&mut self, day: LogicalDay) -> bool {
        if self.is_covered(day) {
            return false;
        }
        // earned is sorted, so the earliest eligible token is the first one
        match self.earned.first() {
            Some(first) if *first <= day => {
                self.earned.remove(0);
                let pos = self.consumed.partition_point(|d| *d < day);
                self.consumed.insert(pos, day);
                true
            }
            _ => false,
        }
    }

    /// Add up to `count` tokens dated `day` while under the cap.
    /// Returns how many were added.
    pub fn grant(&mut self, count: usize, day: LogicalDay) -> usize {
        let room = self.max_freezes.saturating_sub(self.earned.len());
        let granted = count.min(room);
        for _ in 0..granted {
            let pos = self.earned.partition_point(|d| *d <= day);
            self.earned.insert(pos, day);
        }
        granted
    }

    fn evict_surplus(&mut self) {
        if self.earned.len() > self.max_freezes {
            let surplus = self.earned.len() - self.max_freezes;
            self.earned.drain(..surplus);
        }
    }

    /// Describe the first broken invariant, if any
    pub fn check(&self) -> Result<(), String> {
        if self.earned.len() > self.max_freezes {
            return Err(format!(
                "{} earned tokens exceed the cap of {}",
                self.earned.len(),
                self.max_freezes
            ));
        }
        if !self.earned.windows(2).all(|w| w[0] <= w[1]) {
            return Err("earned tokens are not sorted".into());
        }
        if !self.consumed.windows(2).all(|w| w[0] < w[1]) {
            return Err("consumed dates are not sorted or contain duplicates".into());
        }
        Ok(())
    }

    /// Restore the invariants by sorting, de-duplicating and clamping.
    /// Returns whether anything had to change.
    pub fn heal(&mut self) -> bool {
        let Err(problem) = self.check() else {
            return false;
        };
        warn!(problem = %problem, "Freeze ledger invariant broken, healing");

        self.earned.sort();
        self.evict_surplus();
        self.consumed.sort();
        self.consumed.dedup();
        true
    }

    pub fn into_parts(self) -> (Vec<LogicalDay>, Vec<LogicalDay>) {
        (self.earned, self.consumed)
    }
}
