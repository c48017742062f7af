// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for time-window arithmetic.
//!
//! Quota checks and statistic aggregation both slice the activity log by
//! the same day/week/month/year windows, so the boundary math lives here.
//! Weeks are ISO 8601: Monday start, week 1 is the week containing the
//! year's first Thursday.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// An inclusive `[start, end]` window at whole-day resolution: start at
/// 00:00:00.000 and end at 23:59:59.999, naive local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    fn spanning(first_day: NaiveDate, last_day: NaiveDate) -> Self {
        Self {
            start: first_day.and_time(NaiveTime::MIN),
            end: end_of_day(last_day),
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

fn end_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_milli_opt(23, 59, 59, 999)
        .expect("23:59:59.999 is a valid wall-clock time")
}

/// Window covering the single day containing `date`.
pub fn day_bounds(date: NaiveDate) -> TimeWindow {
    TimeWindow::spanning(date, date)
}

/// Window covering the ISO week (Monday through Sunday) containing `date`.
pub fn week_bounds(date: NaiveDate) -> TimeWindow {
    let week = date.week(Weekday::Mon);
    TimeWindow::spanning(week.first_day(), week.last_day())
}

/// Window covering one calendar month. `None` for out-of-range input.
pub fn month_bounds(year: i32, month: u32) -> Option<TimeWindow> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(TimeWindow::spanning(first, next_month.pred_opt()?))
}

/// Window covering one calendar year. `None` for out-of-range input.
pub fn year_bounds(year: i32) -> Option<TimeWindow> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31)?;
    Some(TimeWindow::spanning(first, last))
}

/// ISO week number of `date` (1..=53).
pub fn week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// Resolve which year an ISO week number belongs to.
///
/// The last days of December and first days of January can carry a week
/// number nominally owned by the adjacent year: week >= 48 seen while the
/// calendar month is January belongs to the previous year, and week <= 5
/// seen while the month is December belongs to the next year.
pub fn year_for_week(base_year: i32, month: u32, week: u32) -> i32 {
    if month == 1 && week >= 48 {
        base_year - 1
    } else if month == 12 && week <= 5 {
        base_year + 1
    } else {
        base_year
    }
}

/// Window spanning the whole representable range, for all-time totals.
pub fn all_time() -> TimeWindow {
    TimeWindow {
        start: NaiveDateTime::MIN,
        end: NaiveDateTime::MAX,
    }
}

/// Window `days_back` days wide ending on `date`, used for recent-activity
/// listings.
pub fn trailing_days(date: NaiveDate, days_back: u64) -> TimeWindow {
    let first = date
        .checked_sub_days(Days::new(days_back.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN);
    TimeWindow::spanning(first, date)
}
