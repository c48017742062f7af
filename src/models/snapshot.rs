//! Derived statistics snapshot. Never persisted.

use serde::Serialize;

/// Scalar totals for one (user, optional mentor, time window) slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub work_hours: f64,
    pub study_hours: f64,
    pub total_hours: f64,
    pub project_count: u32,
}
