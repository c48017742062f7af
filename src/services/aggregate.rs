// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity aggregation into statistics snapshots.
//!
//! Reduces raw activity-log entries and project rows to the scalar totals
//! the rule evaluator and quota validator consume. This is the single
//! place windowing and mentor partitioning of the activity log happen.

use crate::models::{ActivityEntry, EntryKind, Project, StatisticsSnapshot};
use crate::time_windows::TimeWindow;

/// Reduce `entries` and `projects` to totals for one window, optionally
/// restricted to rows attributed to one mentor.
///
/// When a mentor filter is active, rows with no mentor attribution are
/// excluded. Upstream records are not schema-enforced, so non-finite or
/// negative hour values count as zero instead of poisoning the totals.
pub fn aggregate(
    entries: &[ActivityEntry],
    projects: &[Project],
    window: &TimeWindow,
    mentor_filter: Option<&str>,
) -> StatisticsSnapshot {
    let mut snapshot = StatisticsSnapshot::default();

    for entry in entries {
        if !window.contains(entry.occurred_at) {
            continue;
        }
        if !mentor_matches(entry.mentor_id.as_deref(), mentor_filter) {
            continue;
        }
        let hours = sanitize_hours(entry.hours);
        match entry.kind {
            EntryKind::Work => snapshot.work_hours += hours,
            EntryKind::Study => snapshot.study_hours += hours,
        }
    }

    snapshot.total_hours = snapshot.work_hours + snapshot.study_hours;

    snapshot.project_count = projects
        .iter()
        .filter(|p| window.contains(p.created_at))
        .filter(|p| mentor_matches(p.mentor_id.as_deref(), mentor_filter))
        .count() as u32;

    snapshot
}

fn mentor_matches(attributed: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        Some(mentor) => attributed == Some(mentor),
        None => true,
    }
}

fn sanitize_hours(hours: f64) -> f64 {
    if hours.is_finite() && hours > 0.0 {
        hours
    } else {
        0.0
    }
}
