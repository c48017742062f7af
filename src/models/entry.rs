// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Logged activity entry model for storage and API.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Category of a logged entry. Fixed once the entry is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Work,
    Study,
}

/// Stored activity-log entry in Firestore.
///
/// Owned by the apprentice. Hours are logged in 0.5 increments and are
/// validated against the hour quotas at write time; already-stored entries
/// are never retroactively invalidated when limits shrink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Entry ID (also used as document ID)
    pub entry_id: String,
    /// Owning apprentice's user ID
    pub owner_id: String,
    /// Work or study
    pub kind: EntryKind,
    /// Logged hours (non-negative, 0.5 increments)
    pub hours: f64,
    /// When the hours were worked (naive local time)
    pub occurred_at: NaiveDateTime,
    /// Mentor this entry is attributed to, if any
    #[serde(default)]
    pub mentor_id: Option<String>,
    /// Free-form note
    #[serde(default)]
    pub note: String,
}
