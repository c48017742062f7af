// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role-aware view-model projection for reconciled achievements.
//!
//! Pure, read-only transform: lock state and attribution are decided by the
//! reconciliation engine, never here.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{RuleType, TemplateKind, UnlockRule};
use crate::services::reconcile::{ReconciledAchievement, Viewer};

/// Display data for one achievement, shaped for the requesting role.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AchievementView {
    pub template_id: String,
    pub title: String,
    pub category: TemplateKind,
    pub points: u32,
    /// Mentor the unlock state belongs to, for per-mentor templates
    pub mentor_id: Option<String>,
    pub is_locked: bool,
    pub attribution_initials: Vec<String>,
    pub attribution_names: Vec<String>,
    pub requirement_text: String,
}

/// Project one reconciled achievement into its view model.
pub fn project(item: &ReconciledAchievement, viewer: &Viewer) -> AchievementView {
    // Apprentices see who granted a manual unlock; mentors and hosts see
    // which apprentices hold the unlock.
    let people: Vec<_> = match viewer {
        Viewer::Apprentice { .. } => item.granted_by.iter().collect(),
        Viewer::Mentor { .. } | Viewer::Host => item.earners.iter().collect(),
    };

    AchievementView {
        template_id: item.template.template_id.clone(),
        title: item.template.title.clone(),
        category: item.template.kind,
        points: item.template.points,
        mentor_id: item.mentor_id.clone(),
        is_locked: item.locked,
        attribution_initials: people.iter().map(|u| u.initials()).collect(),
        attribution_names: people.iter().map(|u| u.display_name()).collect(),
        requirement_text: requirement_text(&item.rule_set.rules),
    }
}

/// Render a template's rules as a human-readable requirement line.
///
/// Automatic rules are joined with `" • "`; a manual rule contributes the
/// fixed "Unlocked by mentor" prefix.
pub fn requirement_text(rules: &[UnlockRule]) -> String {
    let mut parts = Vec::new();
    if rules.iter().any(|r| r.rule_type == RuleType::Manual) {
        parts.push("Unlocked by mentor".to_string());
    }
    for rule in rules {
        let threshold = fmt_threshold(rule.threshold.unwrap_or(0.0));
        let phrase = match rule.rule_type {
            RuleType::Manual => continue,
            RuleType::WorkHours => format!("Log {} work hours", threshold),
            RuleType::StudyHours => format!("Log {} study hours", threshold),
            RuleType::TotalHours => format!("Log {} total hours", threshold),
            RuleType::ProjectCount => format!("Complete {} projects", threshold),
        };
        parts.push(phrase);
    }
    parts.join(" • ")
}

fn fmt_threshold(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
