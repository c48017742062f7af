// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregate;
pub mod display;
pub mod quota;
pub mod reconcile;
pub mod rules;

pub use aggregate::aggregate;
pub use display::AchievementView;
pub use quota::{check_quota, QuotaCheck};
pub use reconcile::{decide, ReconcileEngine, Viewer};
pub use rules::{evaluate, RuleSet, RuleVerdict};
