//! Wall clock and duration helpers
//!
//! In debug builds `STREAK_MOCK_TIME=YYYY-MM-DD HH:MM:SS` shifts the clock
//! returned by [`now`], so day rollover and streak breaks can be checked by
//! hand. The shift is captured once and the mocked clock keeps ticking.
//!
//! ```bash
//! STREAK_MOCK_TIME="2025-12-25 03:59:00" streakd status
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable holding the mocked wall-clock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "STREAK_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Parse a mock time value into a local instant
pub fn parse_mock_time(value: &str) -> Result<DateTime<Local>, String> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), MOCK_TIME_FORMAT)
        .map_err(|e| format!("expected {}: {}", MOCK_TIME_FORMAT, e))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{} does not exist in the local time zone", value))
}

#[allow(clippy::disallowed_methods)] // Reads the real clock once to compute the shift
fn mock_offset() -> Option<chrono::Duration> {
    *MOCK_OFFSET.get_or_init(|| {
        if !cfg!(debug_assertions) {
            return None;
        }
        let value = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
        match parse_mock_time(&value) {
            Ok(mocked) => {
                let offset = mocked.signed_duration_since(Local::now());
                tracing::info!(mock_time = %value, offset_secs = offset.num_seconds(), "Mock time enabled");
                Some(offset)
            }
            Err(e) => {
                tracing::warn!(mock_time = %value, error = %e, "Ignoring invalid mock time");
                None
            }
        }
    })
}

/// Whether [`now`] is shifted by a mock time
pub fn is_mock_time_active() -> bool {
    mock_offset().is_some()
}

/// The current local time, honoring mock time in debug builds
#[allow(clippy::disallowed_methods)] // The one place the real clock is read
pub fn now() -> DateTime<Local> {
    let real = Local::now();
    match mock_offset() {
        Some(offset) => real + offset,
        None => real,
    }
}

/// Epoch milliseconds, as stored by the activity log, to local time
pub fn local_from_millis(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}

/// Human-readable duration: `1h 2m 3s`, `4m 5s`, `6s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(14 * 60)), "14m 0s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_parse_mock_time() {
        let parsed = parse_mock_time("2025-12-25 03:59:00").unwrap();
        assert_eq!((parsed.month(), parsed.day(), parsed.hour()), (12, 25, 3));

        for bad in ["2025-12-25", "03:59:00", "2025-12-25T03:59:00", ""] {
            assert!(parse_mock_time(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_local_from_millis() {
        let dt = Local.with_ymd_and_hms(2025, 6, 8, 22, 12, 28).unwrap();
        assert_eq!(local_from_millis(dt.timestamp_millis()), Some(dt));
    }

    #[test]
    fn test_now_is_plausible() {
        let year = now().year();
        assert!((2020..=2100).contains(&year));
    }
}
