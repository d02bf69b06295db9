//! Local-day normalization and day-index arithmetic.
//!
//! Every date comparison in the engine happens at local-day granularity,
//! never instant granularity: a timestamp is first truncated to the start
//! of its day in one fixed timezone (UTC+07:00 by default), and only the
//! resulting [`LocalDay`] values are compared.
//!
//! The current time is never read from a global; it enters through the
//! [`Clock`] trait so date rollover is deterministic under test.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Default UTC offset in hours for local-day truncation (Vietnam, UTC+7).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// A calendar day boundary in the engine's fixed timezone.
///
/// # Example
///
/// ```
/// use sprout::calendar::LocalDay;
///
/// let a = LocalDay::from_ymd(2026, 3, 1).unwrap();
/// let b = LocalDay::from_ymd(2026, 3, 4).unwrap();
/// assert_eq!(a.days_until(b), 3);
/// assert_eq!(b.days_until(a), -3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalDay(NaiveDate);

impl LocalDay {
    /// Build a local day from calendar components.
    ///
    /// Returns `None` for out-of-range dates.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The underlying calendar date.
    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// The weekday this local day falls on.
    #[must_use]
    pub fn weekday(self) -> Weekday {
        self.0.weekday()
    }

    /// Signed count of local-day boundaries crossed from `self` to `other`.
    #[must_use]
    pub fn days_until(self, other: LocalDay) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }

    /// The local day `days` after (or before, if negative) this one.
    #[must_use]
    pub fn plus_days(self, days: i64) -> LocalDay {
        Self(self.0 + chrono::Duration::days(days))
    }
}

impl From<NaiveDate> for LocalDay {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for LocalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts timestamps to [`LocalDay`] values at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    /// Create a calendar at the given UTC offset in whole hours.
    ///
    /// Offsets outside [-12, +14] are rejected.
    pub fn new(utc_offset_hours: i32) -> Option<Self> {
        if !(-12..=14).contains(&utc_offset_hours) {
            return None;
        }
        FixedOffset::east_opt(utc_offset_hours * 3600).map(|offset| Self { offset })
    }

    /// Calendar at the engine default offset (UTC+7).
    #[must_use]
    pub fn vn() -> Self {
        Self::new(DEFAULT_UTC_OFFSET_HOURS).expect("default offset is valid")
    }

    /// Truncate a timestamp to the start of its local day.
    #[must_use]
    pub fn local_day(&self, ts: DateTime<Utc>) -> LocalDay {
        LocalDay(ts.with_timezone(&self.offset).date_naive())
    }

    /// The configured UTC offset.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::vn()
    }
}

/// 1-based count of local days since `planted`.
///
/// Always >= 1 given the precondition that `planted` is not in the future.
#[must_use]
pub fn day_of_life(planted: LocalDay, today: LocalDay) -> i64 {
    planted.days_until(today) + 1
}

/// Source of the current instant.
///
/// Injected everywhere "now" is needed so tests can pin and advance time
/// without touching any global state.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: starts at a pinned instant and advances
/// only when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Pin the clock at the given instant.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += chrono::Duration::days(days);
    }

    /// Jump the clock to a new instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_day_truncation_at_offset() {
        let calendar = Calendar::vn();

        // 16:59 UTC on March 1st is 23:59 on March 1st in UTC+7.
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 16, 59, 0).unwrap();
        assert_eq!(calendar.local_day(ts), LocalDay::from_ymd(2026, 3, 1).unwrap());

        // 17:00 UTC on March 1st is already March 2nd in UTC+7.
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap();
        assert_eq!(calendar.local_day(ts), LocalDay::from_ymd(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_days_until_sign_aware() {
        let a = LocalDay::from_ymd(2026, 2, 27).unwrap();
        let b = LocalDay::from_ymd(2026, 3, 2).unwrap();
        assert_eq!(a.days_until(b), 3);
        assert_eq!(b.days_until(a), -3);
        assert_eq!(a.days_until(a), 0);
    }

    #[test]
    fn test_day_of_life_is_one_based() {
        let planted = LocalDay::from_ymd(2026, 3, 1).unwrap();
        assert_eq!(day_of_life(planted, planted), 1);

        let later = LocalDay::from_ymd(2026, 3, 6).unwrap();
        assert_eq!(day_of_life(planted, later), 6);
    }

    #[test]
    fn test_calendar_rejects_out_of_range_offsets() {
        assert!(Calendar::new(-13).is_none());
        assert!(Calendar::new(15).is_none());
        assert!(Calendar::new(0).is_some());
        assert!(Calendar::new(7).is_some());
    }

    #[test]
    fn test_weekday() {
        // 2026-03-02 is a Monday.
        let day = LocalDay::from_ymd(2026, 3, 2).unwrap();
        assert_eq!(day.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let clock = FixedClock::at(start);
        assert_eq!(clock.now(), start);

        clock.advance_days(2);
        assert_eq!(clock.now(), start + chrono::Duration::days(2));
    }

    #[test]
    fn test_local_day_serde_roundtrip() {
        let day = LocalDay::from_ymd(2026, 3, 1).unwrap();
        let json = serde_json::to_string(&day).unwrap();
        assert_eq!(json, "\"2026-03-01\"");
        let back: LocalDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day);
    }
}
