// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unlock-rule evaluation against a statistics snapshot.

use crate::models::{RuleCombinator, RuleType, StatisticsSnapshot, UnlockRule};

/// A template's rules plus the policy combining them.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub combinator: RuleCombinator,
    pub rules: Vec<UnlockRule>,
}

/// Result of evaluating a rule set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleVerdict {
    /// Whether the automatic rules are currently met.
    pub satisfied: bool,
    /// Whether the set contains a manual rule. Manual-only sets never take
    /// automatic lock/unlock transitions; unlocking them goes through the
    /// explicit grant path.
    pub manual_only: bool,
    /// IDs of the automatic rules that held, for attribution.
    pub satisfied_rule_ids: Vec<String>,
}

/// Evaluate a rule set against a snapshot.
///
/// An empty rule set is never satisfied. Manual rules flip `manual_only`
/// and are excluded from the automatic subset; if nothing automatic
/// remains, `satisfied` stays false. Thresholds are inclusive.
pub fn evaluate(rule_set: &RuleSet, snapshot: &StatisticsSnapshot) -> RuleVerdict {
    let mut verdict = RuleVerdict::default();
    if rule_set.rules.is_empty() {
        return verdict;
    }

    let mut automatic_total = 0usize;
    for rule in &rule_set.rules {
        if rule.rule_type == RuleType::Manual {
            verdict.manual_only = true;
            continue;
        }
        automatic_total += 1;
        if rule_holds(rule, snapshot) {
            verdict.satisfied_rule_ids.push(rule.rule_id.clone());
        }
    }

    verdict.satisfied = match rule_set.combinator {
        _ if automatic_total == 0 => false,
        RuleCombinator::And => verdict.satisfied_rule_ids.len() == automatic_total,
        RuleCombinator::Or => !verdict.satisfied_rule_ids.is_empty(),
    };

    verdict
}

fn rule_holds(rule: &UnlockRule, snapshot: &StatisticsSnapshot) -> bool {
    // Thresholds are optional in the store; missing or non-finite values
    // sanitize to zero rather than erroring.
    let threshold = rule.threshold.filter(|t| t.is_finite()).unwrap_or(0.0);
    let observed = match rule.rule_type {
        RuleType::Manual => return false,
        RuleType::WorkHours => snapshot.work_hours,
        RuleType::StudyHours => snapshot.study_hours,
        RuleType::TotalHours => snapshot.total_hours,
        RuleType::ProjectCount => snapshot.project_count as f64,
    };
    observed >= threshold
}
