//! Clock abstraction and calendar-period helpers
//!
//! Engines never call `Utc::now()` directly; they read time through an
//! injected [`Clock`] so month boundaries can be pinned in tests.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// First instant (UTC) of the calendar month containing `at`.
pub fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// First instant (UTC) of the ISO week (Monday) containing `at`.
pub fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = at.weekday().num_days_from_monday() as i64;
    let day = at.date_naive() - Duration::days(days_from_monday);
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// True when `last_reset` falls before the month that contains `now`.
pub fn is_new_month(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last_reset < month_start(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(at(2026, 10, 19, 13)), at(2026, 10, 1, 0));
        assert_eq!(month_start(at(2026, 1, 1, 0)), at(2026, 1, 1, 0));
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2026-10-19 is a Monday
        assert_eq!(week_start(at(2026, 10, 21, 9)), at(2026, 10, 19, 0));
        assert_eq!(week_start(at(2026, 10, 19, 0)), at(2026, 10, 19, 0));
    }

    #[test]
    fn test_is_new_month_across_year_boundary() {
        assert!(is_new_month(at(2025, 12, 31, 23), at(2026, 1, 1, 0)));
        assert!(!is_new_month(at(2026, 1, 1, 0), at(2026, 1, 31, 23)));
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(at(2026, 3, 31, 23));
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), at(2026, 4, 1, 1));
    }
}
