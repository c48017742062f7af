// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Hour-quota limit configuration.

use crate::models::EntryKind;
use serde::{Deserialize, Serialize};

/// Whose limits a record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LimitScope {
    /// The single guild-wide default record.
    Global,
    /// An override for one user. Replaces the global record entirely,
    /// field-level merging is never done.
    PerUser { user_id: String },
}

/// Time window a quota applies to, in checking order (day first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl QuotaPeriod {
    /// All periods in the order quota checks run.
    pub const ALL: [QuotaPeriod; 4] = [
        QuotaPeriod::Day,
        QuotaPeriod::Week,
        QuotaPeriod::Month,
        QuotaPeriod::Year,
    ];
}

/// Hour caps per category per period, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourLimits {
    pub scope: LimitScope,
    pub max_work_per_day: f64,
    pub max_study_per_day: f64,
    pub max_work_per_week: f64,
    pub max_study_per_week: f64,
    pub max_work_per_month: f64,
    pub max_study_per_month: f64,
    pub max_work_per_year: f64,
    pub max_study_per_year: f64,
}

impl HourLimits {
    /// The cap for one (period, category) pair.
    pub fn limit_for(&self, period: QuotaPeriod, kind: EntryKind) -> f64 {
        match (period, kind) {
            (QuotaPeriod::Day, EntryKind::Work) => self.max_work_per_day,
            (QuotaPeriod::Day, EntryKind::Study) => self.max_study_per_day,
            (QuotaPeriod::Week, EntryKind::Work) => self.max_work_per_week,
            (QuotaPeriod::Week, EntryKind::Study) => self.max_study_per_week,
            (QuotaPeriod::Month, EntryKind::Work) => self.max_work_per_month,
            (QuotaPeriod::Month, EntryKind::Study) => self.max_study_per_month,
            (QuotaPeriod::Year, EntryKind::Work) => self.max_work_per_year,
            (QuotaPeriod::Year, EntryKind::Study) => self.max_study_per_year,
        }
    }

    /// Guild-wide defaults used when no record exists in the store yet.
    pub fn default_global() -> Self {
        Self {
            scope: LimitScope::Global,
            max_work_per_day: 8.0,
            max_study_per_day: 8.0,
            max_work_per_week: 40.0,
            max_study_per_week: 40.0,
            max_work_per_month: 160.0,
            max_study_per_month: 160.0,
            max_work_per_year: 1920.0,
            max_study_per_year: 1920.0,
        }
    }
}

/// Pick the limits record for an entry owner: a per-user override wins
/// wholesale, otherwise the global defaults apply.
pub fn resolve_limits(per_user: Option<HourLimits>, global: HourLimits) -> HourLimits {
    per_user.unwrap_or(global)
}
