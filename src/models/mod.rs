// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod achievement;
pub mod entry;
pub mod limits;
pub mod project;
pub mod snapshot;
pub mod user;

pub use achievement::{
    AchievementRecord, AchievementTemplate, RuleCombinator, RuleType, TemplateKind, TemplateScope,
    UnlockHistoryEntry, UnlockRule, UNLOCKED_BY_SYSTEM,
};
pub use entry::{ActivityEntry, EntryKind};
pub use limits::{resolve_limits, HourLimits, LimitScope, QuotaPeriod};
pub use project::Project;
pub use snapshot::StatisticsSnapshot;
pub use user::{Mentorship, Role, User};
