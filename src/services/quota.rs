// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hour-quota validation for new and edited entries.
//!
//! An edit is charged on the marginal change (`proposed - previous`), so
//! shrinking an entry always passes. Periods are checked day first and the
//! first violated one wins, matching the incremental validation the entry
//! form does.

use chrono::{Datelike, NaiveDate};

use crate::models::{ActivityEntry, EntryKind, HourLimits, QuotaPeriod};
use crate::services::aggregate::aggregate;
use crate::time_windows::{day_bounds, month_bounds, week_bounds, year_bounds, TimeWindow};

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuotaCheck {
    Ok,
    /// The first violated period and the cap that was exceeded.
    Violation { period: QuotaPeriod, limit: f64 },
}

impl QuotaCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, QuotaCheck::Ok)
    }
}

/// Check a proposed entry (or edit) against the day/week/month/year caps
/// for its category.
///
/// `entries` is the owner's full activity log; the sums for each period are
/// taken under the same category and mentor scope as the entry being
/// written. `previous_hours` is the entry's stored value when editing, zero
/// for a brand-new entry.
#[allow(clippy::too_many_arguments)]
pub fn check_quota(
    entries: &[ActivityEntry],
    kind: EntryKind,
    proposed_hours: f64,
    previous_hours: f64,
    reference_date: NaiveDate,
    mentor: Option<&str>,
    limits: &HourLimits,
) -> QuotaCheck {
    let delta = sanitize(proposed_hours) - sanitize(previous_hours);

    for period in QuotaPeriod::ALL {
        let window = window_for(period, reference_date);
        let snapshot = aggregate(entries, &[], &window, mentor);
        let current = match kind {
            EntryKind::Work => snapshot.work_hours,
            EntryKind::Study => snapshot.study_hours,
        };
        let limit = limits.limit_for(period, kind);
        if current + delta > limit {
            return QuotaCheck::Violation { period, limit };
        }
    }

    QuotaCheck::Ok
}

fn window_for(period: QuotaPeriod, reference: NaiveDate) -> TimeWindow {
    match period {
        QuotaPeriod::Day => day_bounds(reference),
        QuotaPeriod::Week => week_bounds(reference),
        QuotaPeriod::Month => {
            // Components of a valid NaiveDate always form a valid month
            month_bounds(reference.year(), reference.month())
                .unwrap_or_else(|| day_bounds(reference))
        }
        QuotaPeriod::Year => {
            year_bounds(reference.year()).unwrap_or_else(|| day_bounds(reference))
        }
    }
}

fn sanitize(hours: f64) -> f64 {
    if hours.is_finite() {
        hours
    } else {
        0.0
    }
}
