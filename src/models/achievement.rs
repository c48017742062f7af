// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Achievement templates, unlock rules, and persisted unlock state.

use serde::{Deserialize, Serialize};

/// What kind of award a template describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Badge,
    Certificate,
}

/// Whether one unlock state exists per apprentice or per
/// (apprentice, mentor) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateScope {
    Global,
    PerMentor,
}

/// AND/OR policy across a template's automatic rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCombinator {
    And,
    Or,
}

/// Typed unlock condition. Closed set; unrecognized condition strings from
/// older data fail deserialization instead of silently never matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Satisfied only by an explicit mentor grant, never by statistics.
    Manual,
    WorkHours,
    StudyHours,
    TotalHours,
    ProjectCount,
}

/// Achievement definition, created and edited by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementTemplate {
    /// Template ID (also used as document ID)
    pub template_id: String,
    /// Display title
    pub title: String,
    /// Badge or certificate
    pub kind: TemplateKind,
    /// Global or per-mentor unlock state
    pub scope: TemplateScope,
    /// Points awarded on unlock
    pub points: u32,
    /// How this template's automatic rules combine
    pub combinator: RuleCombinator,
    /// Whether the template shows up in the standard listing
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// One unlock condition row belonging to a template.
///
/// A template with zero rules can never unlock automatically. `Manual`
/// rules carry no threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRule {
    /// Rule ID (also used as document ID)
    pub rule_id: String,
    /// Owning template ID
    pub template_id: String,
    /// Condition type
    pub rule_type: RuleType,
    /// Inclusive threshold for automatic conditions
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Persisted unlock state for one (user, template[, mentor]) combination.
///
/// Created locked, flipped by the reconciliation engine. Locking flips the
/// flag back rather than deleting the row; attribution history lives in
/// [`UnlockHistoryEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub user_id: String,
    pub template_id: String,
    /// Present iff the template scope is per-mentor
    #[serde(default)]
    pub mentor_id: Option<String>,
    pub locked: bool,
    /// When the current unlock happened (ISO 8601)
    #[serde(default)]
    pub earned_at: Option<String>,
    /// Granting mentor for manual unlocks; None for automatic ones
    #[serde(default)]
    pub granted_by: Option<String>,
}

impl AchievementRecord {
    /// Document ID: `{user}_{template}` with an optional `_{mentor}` suffix.
    pub fn doc_id(user_id: &str, template_id: &str, mentor_id: Option<&str>) -> String {
        match mentor_id {
            Some(m) => format!("{}_{}_{}", user_id, template_id, m),
            None => format!("{}_{}", user_id, template_id),
        }
    }

    /// A fresh locked record for the given combination.
    pub fn locked(user_id: &str, template_id: &str, mentor_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            template_id: template_id.to_string(),
            mentor_id: mentor_id.map(str::to_string),
            locked: true,
            earned_at: None,
            granted_by: None,
        }
    }
}

/// Attribution marker for system-initiated unlocks in history rows.
pub const UNLOCKED_BY_SYSTEM: &str = "system";

/// Attribution row for one (user, template) pair.
///
/// Overwritten on every re-unlock of the same pair; this is a display
/// record, not an immutable audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockHistoryEntry {
    pub user_id: String,
    pub template_id: String,
    /// Granting mentor's user ID, or [`UNLOCKED_BY_SYSTEM`]
    pub unlocked_by: String,
    /// First satisfied rule for automatic unlocks
    #[serde(default)]
    pub rule_id: Option<String>,
    /// When the unlock was written (ISO 8601)
    pub unlocked_at: String,
}

impl UnlockHistoryEntry {
    /// Document ID: one row per (user, template) pair, so a write is a
    /// replace.
    pub fn doc_id(user_id: &str, template_id: &str) -> String {
        format!("{}_{}", user_id, template_id)
    }
}
