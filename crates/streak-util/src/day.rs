//! Logical days and the day boundary resolver
//!
//! A logical day is the calendar date a user perceives, which rolls over at
//! the configured day cutoff (e.g. 04:00) rather than at midnight. Every
//! component that decides "which day does this belong to" goes through
//! [`resolve_logical_day`] so the cutoff is applied the same way everywhere.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Storage and display format of a logical day
pub const DAY_FORMAT: &str = "%Y-%m-%d";

const SECONDS_PER_DAY: i64 = 86_400;

/// Error returned when a string is not a `YYYY-MM-DD` date
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid logical day '{0}': expected YYYY-MM-DD")]
pub struct ParseDayError(pub String);

/// A calendar date as perceived through the user's day cutoff.
///
/// Serializes as a `YYYY-MM-DD` string, so lexical order equals
/// chronological order in every persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalDay(NaiveDate);

impl LogicalDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn parse(s: &str) -> Result<Self, ParseDayError> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
            .map(Self)
            .map_err(|_| ParseDayError(s.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Shift by a signed number of days. `None` only at the limits of the calendar.
    pub fn offset_days(&self, days: i64) -> Option<Self> {
        self.0.checked_add_signed(Duration::days(days)).map(Self)
    }

    /// Number of days from `earlier` to `self` (negative if `earlier` is later)
    pub fn days_since(&self, earlier: LogicalDay) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    /// The `len` consecutive days ending on `last`, oldest first.
    pub fn window_ending(last: LogicalDay, len: u32) -> Vec<LogicalDay> {
        let len = i64::from(len);
        (0..len)
            .filter_map(|i| last.offset_days(i - (len - 1)))
            .collect()
    }
}

impl fmt::Display for LogicalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for LogicalDay {
    type Err = ParseDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LogicalDay {
    type Error = ParseDayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<LogicalDay> for String {
    fn from(day: LogicalDay) -> Self {
        day.to_string()
    }
}

/// Time of day at which one logical day ends and the next begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DayCutoff {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DayCutoff {
    pub const MIDNIGHT: DayCutoff = DayCutoff {
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour < 24 && minute < 60 && second < 60 {
            Some(Self {
                hour,
                minute,
                second,
            })
        } else {
            None
        }
    }

    /// Take the time-of-day of the scheduler's next rollover instant.
    pub fn from_datetime<Tz: TimeZone>(rollover: &DateTime<Tz>) -> Self {
        Self {
            hour: rollover.hour() as u8,
            minute: rollover.minute() as u8,
            second: rollover.second() as u8,
        }
    }

    /// Parse `HH:MM` or `HH:MM:SS`
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err("Expected HH:MM or HH:MM:SS format".into());
        }

        let hour: u8 = parts[0].parse().map_err(|_| "Invalid hour".to_string())?;
        let minute: u8 = parts[1]
            .parse()
            .map_err(|_| "Invalid minute".to_string())?;
        let second: u8 = match parts.get(2) {
            Some(s) => s.parse().map_err(|_| "Invalid second".to_string())?,
            None => 0,
        };

        if hour >= 24 {
            return Err("Hour must be 0-23".into());
        }
        if minute >= 60 {
            return Err("Minute must be 0-59".into());
        }
        if second >= 60 {
            return Err("Second must be 0-59".into());
        }

        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Seconds past midnight
    pub fn offset_seconds(&self) -> i64 {
        i64::from(self.hour) * 3600 + i64::from(self.minute) * 60 + i64::from(self.second)
    }
}

impl fmt::Display for DayCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Map a timestamp to its logical day.
///
/// Shifts the instant back by `cutoff_offset_seconds` and takes the calendar
/// date in the timestamp's own time zone. Any timestamp is valid input; a
/// shift past chrono's representable range saturates to the first or last
/// representable date.
pub fn resolve_logical_day<Tz: TimeZone>(
    timestamp: &DateTime<Tz>,
    cutoff_offset_seconds: i64,
) -> LogicalDay {
    let shifted = Duration::try_seconds(cutoff_offset_seconds)
        .and_then(|offset| timestamp.clone().checked_sub_signed(offset));
    match shifted {
        Some(shifted) => LogicalDay(shifted.date_naive()),
        None if cutoff_offset_seconds > 0 => LogicalDay(NaiveDate::MIN),
        None => LogicalDay(NaiveDate::MAX),
    }
}

/// The half-open instant range `[start, end)` covered by a logical day in `tz`.
///
/// The exact inverse of [`resolve_logical_day`]: a timestamp resolves to
/// `day` iff it lies in this range. Each bound is the first instant of a
/// calendar date plus the cutoff offset as elapsed time, so on a DST
/// transition the bounds may not sit at the cutoff's wall-clock time.
pub fn day_bounds<Tz: TimeZone>(
    day: LogicalDay,
    cutoff: DayCutoff,
    tz: &Tz,
) -> (DateTime<Tz>, DateTime<Tz>) {
    let offset = Duration::seconds(cutoff.offset_seconds());
    let start_of_date = start_of(tz, day.0);
    let end_of_date = match day.offset_days(1) {
        Some(next) => start_of(tz, next.0),
        None => saturating_add(start_of_date.clone(), Duration::seconds(SECONDS_PER_DAY)),
    };
    (
        saturating_add(start_of_date, offset),
        saturating_add(end_of_date, offset),
    )
}

fn saturating_add<Tz: TimeZone>(instant: DateTime<Tz>, delta: Duration) -> DateTime<Tz> {
    instant.clone().checked_add_signed(delta).unwrap_or(instant)
}

/// The first instant of `date` in `tz`, stepping past a DST gap at midnight.
fn start_of<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}
